use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use discuze::{Config, MemoryStore, PostStore, Site, User};
use tokio::sync::Mutex;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long, default_value_t = 3030)]
    port: u16,

    /// SQLite database file. Overrides DISCUZE_DATABASE.
    /// Needs the `sqlite` feature; without it posts are kept in memory.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Create a user with this display name before serving. May be repeated.
    /// Their ids are printed so they can be sent in the x-user-id header.
    #[arg(long = "user")]
    users: Vec<String>,
}

struct Discuze<S> {
    store: Arc<Mutex<S>>,
}

impl<S: PostStore + Send + Sync + 'static> Site<S> for Discuze<S> {
    fn store(&self) -> Arc<Mutex<S>> {
        self.store.clone()
    }
}

impl<S: PostStore + Send + Sync + 'static> Discuze<S> {
    async fn seed(&self, names: Vec<String>) -> Result<()> {
        let mut store = self.store.lock().await;
        for name in names {
            let user = User::new(name);
            println!("{} -> {}", user.name, user.id);
            store.insert_user(user).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load_env_config()?;
    if args.database.is_some() {
        config.database = args.database;
    }
    let address = SocketAddr::new(args.host, args.port);

    #[cfg(feature = "sqlite")]
    if let Some(path) = config.database.clone() {
        let site = Discuze {
            store: Arc::new(Mutex::new(discuze::SqliteStore::open(path)?)),
        };
        site.seed(args.users).await?;
        site.start_with_config(config, address).await;
        return Ok(());
    }

    #[cfg(not(feature = "sqlite"))]
    if config.database.is_some() {
        anyhow::bail!("DISCUZE_DATABASE is set but the `sqlite` feature is disabled");
    }

    let site = Discuze {
        store: Arc::new(Mutex::new(MemoryStore::new())),
    };
    site.seed(args.users).await?;
    site.start_with_config(config, address).await;
    Ok(())
}
