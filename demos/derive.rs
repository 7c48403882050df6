//! Declaring services with `#[derive(TpService)]`
//!
//! ```bash
//! cargo run --example derive --features derive
//! ```

use std::sync::Arc;
use tarpit::prelude::*;

#[derive(TpService)]
struct Clock;

#[derive(TpService)]
#[tp(name = "Greeter")]
struct GreeterService {
    #[inject]
    clock: Arc<Clock>,
    #[inject(token = "greeting")]
    greeting: Arc<String>,
    #[inject(optional, token = "audience")]
    audience: Option<Arc<String>>,
    greeted: u32,
}

impl GreeterService {
    fn greet(&self) -> String {
        let audience = self.audience.as_deref().map_or("world", String::as_str);
        format!("{}, {audience}! ({} greeted before)", self.greeting, self.greeted)
    }
}

fn main() -> Result<()> {
    let platform = Platform::new(ConfigData::default())?;
    platform
        .import(ProviderDef::value("greeting", String::from("Hello")))?
        .import(component::<Clock>())?
        .import(component::<GreeterService>())?;

    let greeter = platform.expose::<GreeterService>()?.ok_or_else(|| {
        DiError::creation_failed::<GreeterService>("not registered")
    })?;
    let clock = platform.expose::<Clock>()?;
    println!("{}", greeter.greet());
    println!("shared clock: {}", clock.is_some_and(|c| Arc::ptr_eq(&c, &greeter.clock)));
    Ok(())
}
