use std::process;

use script_bridge::{init_logging, Bridge, BridgeConfig, BridgeResult, CallFacade, HostValue};

fn run(path: &str) -> BridgeResult<String> {
    let mut config = BridgeConfig::load_or_default();
    config.apply_env_overrides();
    init_logging(&config.logging)?;

    let source = std::fs::read_to_string(path)
        .map_err(|e| script_bridge::HostException::new(format!("{}: {}", path, e)))?;
    let bridge = Bridge::new(config)?;
    bridge.set_global_property(
        "print",
        HostValue::function("print", |scope, _, args| {
            let line = args
                .iter()
                .map(|arg| match arg {
                    HostValue::String(text) => Ok(text.clone()),
                    other => scope.stringify(other),
                })
                .collect::<BridgeResult<Vec<_>>>()?;
            println!("{}", line.join(" "));
            Ok(HostValue::Null)
        }),
    )?;

    let result = bridge.evaluate(&source, path)?;
    bridge.run_pending_jobs()?;
    bridge.stringify(&result)
}

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: script_bridge <script.js>");
        process::exit(2);
    };
    match run(&path) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Script failed: {}", e);
            if let script_bridge::BridgeError::Script(exception) = &e {
                eprintln!("{}", exception.stack_trace());
            }
            process::exit(1);
        }
    }
}
