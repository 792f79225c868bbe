use clap::Parser;
use client::network::GameClient;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server TCP address (reliable channel)
    #[arg(short = 's', long, default_value = "127.0.0.1:44445")]
    server: String,

    /// Server UDP address (unreliable channel)
    #[arg(short = 'u', long, default_value = "127.0.0.1:44446")]
    udp: String,

    /// Account name
    #[arg(short = 'n', long)]
    name: String,

    /// Account password
    #[arg(short = 'p', long)]
    password: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let client = match GameClient::connect(&args.server, &args.udp).await {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = client.run(&args.name, &args.password).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
