use clap::Parser;
use log::{error, info};
use server::accounts::FileAccountStore;
use server::config::ServerConfig;
use server::console::spawn_console;
use server::handlers::ServerPacketHandler;
use server::network::Server;
use server::tick::{GameClock, TickLoop};
use server::transport::socket::SocketTransport;
use server::world::World;
use shared::MapIndex;

const DEFAULT_MAP: MapIndex = MapIndex::new(1);

/// Parses the command line, loads accounts, opens the sockets and runs the
/// tick loop until the console or Ctrl+C asks it to stop.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = ServerConfig::parse();

    let accounts = match FileAccountStore::open(&config.accounts, !config.no_auto_register) {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("Cannot load accounts from {}: {}", config.accounts.display(), e);
            std::process::exit(1);
        }
    };

    let transport = SocketTransport::bind(
        &config.tcp_addr(),
        &config.udp_addr(),
        config.max_unreliable_size,
    )?;

    let mut tick = TickLoop::new(
        GameClock::start(),
        config.tick_duration(),
        config.housekeeping_interval(),
    );
    transport.stop_on_ctrl_c(tick.running_flag());
    spawn_console(tick.running_flag())?;

    let handler = ServerPacketHandler::new(
        World::with_default_contents(DEFAULT_MAP),
        Box::new(accounts),
    );
    let mut server = Server::new(&config, Box::new(transport), handler)?;

    info!("Server ready; type `help` for console commands");
    tick.run(&mut server);
    server.shutdown();
    Ok(())
}
