use clap::Parser;
use tokio::task::JoinSet;
use vrrp_failover::{
    config::{parse_cli_opts, Action, CliArgs},
    general::{config_to_vr, enroll_address_hooks, virtual_address_action},
    logging::init_logger,
};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    if let Err(err) = init_logger(&args.log_level, args.log_file.as_deref()) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let routers_config = match parse_cli_opts(args) {
        Ok(config) => {
            log::debug!("Configs read successfully");
            config
        }
        Err(err) => {
            log::error!("Error reading configs {err}");
            std::process::exit(1);
        }
    };

    let mut routers_tasks = JoinSet::new();
    for config in routers_config {
        match config.action {
            Action::Run => {
                let (mut vrouter, link) = match config_to_vr(&config) {
                    Ok(instance) => instance,
                    Err(err) => {
                        log::error!("unable to set up VRID {}: {err}", config.vrid);
                        continue;
                    }
                };
                enroll_address_hooks(&mut vrouter, &config.ip_addresses);
                routers_tasks.spawn(vrrp_failover::run(vrouter, link));
            }
            Action::Teardown => {
                let name = config.name.as_deref().unwrap_or("unnamed");
                log::info!("tearing down {name} (VRID {})", config.vrid);
                virtual_address_action("delete", &config.ip_addresses, &config.interface_name);
                log::info!("{name} tear down complete");
            }
        }
    }

    if routers_tasks.is_empty() {
        log::info!("failover shutting down. No VRRP instances to run");
        std::process::exit(0);
    }

    while let Some(res) = routers_tasks.join_next().await {
        match res {
            Ok(Ok(vrouter)) => log::info!("({}) finished in {} state", vrouter.name, vrouter.state()),
            Ok(Err(err)) => log::error!("virtual router stopped with error: {err}"),
            Err(err) => log::error!("virtual router task failed: {err}"),
        }
    }
}
