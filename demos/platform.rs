//! Platform lifecycle walkthrough
//!
//! Run with pretty logging:
//! ```bash
//! cargo run --example platform --features logging-pretty
//! ```

use std::sync::Arc;
use tarpit::prelude::*;

struct Database {
    url: String,
}

impl Component for Database {
    fn dependencies() -> Vec<Dep> {
        vec![Dep::on::<ConfigData>()]
    }

    fn construct(args: &Args) -> Result<Self> {
        let config = args.get::<ConfigData>(0)?;
        let url = config
            .get_as::<String>("database.url")?
            .unwrap_or_else(|| "postgres://localhost/app".into());
        Ok(Database { url })
    }

    fn lifecycle(this: &Arc<Self>, loader: &TpLoader) {
        let db = Arc::clone(this);
        loader.on_start(move || {
            let db = Arc::clone(&db);
            async move {
                println!("  [Database] connecting to {}", db.url);
                Ok(())
            }
        });
        loader.on_terminate(|| async {
            println!("  [Database] closing pool");
            Ok(())
        });
    }
}

struct Users {
    db: Arc<Database>,
}

impl Component for Users {
    fn dependencies() -> Vec<Dep> {
        vec![Dep::on::<Database>()]
    }

    fn construct(args: &Args) -> Result<Self> {
        Ok(Users { db: args.get(0)? })
    }
}

struct Metrics;

impl Component for Metrics {
    fn construct(_: &Args) -> Result<Self> {
        Ok(Metrics)
    }
}

struct StorageModule;

impl Component for StorageModule {
    fn meta() -> ComponentMeta {
        ComponentMeta::module().provide(component::<Database>())
    }

    fn construct(_: &Args) -> Result<Self> {
        Ok(StorageModule)
    }
}

// Nothing resolves Metrics, so this module is reported as unused.
struct MetricsModule;

impl Component for MetricsModule {
    fn meta() -> ComponentMeta {
        ComponentMeta::module().provide(component::<Metrics>())
    }

    fn construct(_: &Args) -> Result<Self> {
        Ok(MetricsModule)
    }
}

struct App;

impl Component for App {
    fn meta() -> ComponentMeta {
        ComponentMeta::root()
            .import(component::<StorageModule>())
            .import(component::<MetricsModule>())
            .provide(component::<Users>())
    }

    fn dependencies() -> Vec<Dep> {
        vec![Dep::on::<Users>()]
    }

    fn construct(args: &Args) -> Result<Self> {
        let users = args.get::<Users>(0)?;
        println!("  [App] users backed by {}", users.db.url);
        Ok(App)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tarpit::logging::builder().pretty().tarpit_only().init();

    println!("=== Tarpit Platform Demo ===\n");

    let config = ConfigData::new(serde_json::json!({
        "database": { "url": "postgres://db.internal/shop" }
    }));
    let platform = Platform::new(config)?;
    platform.bootstrap::<App>()?;

    println!("\nProvider tree:\n{}\n", platform.provider_tree());

    platform.start().await;
    println!("Started in {:.3}s", platform.inspector().wait_start().await);

    platform.terminate().await;
    println!("Terminated in {:.3}s", platform.inspector().wait_terminate().await);
    Ok(())
}
