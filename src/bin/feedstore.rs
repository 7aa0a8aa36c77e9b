use std::{env, process, sync::Arc};

use feedstore::{
    backend_selector::{StoreConfig, open_service},
    client::{CommandLineConfig, run_command},
    logging::init_logging,
    sql::HelperRegistry,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", CommandLineConfig::help());
        return;
    }
    let defaults = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let config = match CommandLineConfig::from_args(&arg_refs, defaults) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };
    if let Err(err) = init_logging(&config.log_level, config.log_dir.as_deref()) {
        eprintln!("error: {err}");
        process::exit(2);
    }

    let registry = Arc::new(HelperRegistry::with_builtin());
    let service = match open_service(&config.store, registry) {
        Ok(service) => service,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    match run_command(service.as_ref(), config.command) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(err) => {
            eprintln!("command failed: {err}");
            process::exit(1);
        }
    }
}
