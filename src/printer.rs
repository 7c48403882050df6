//! Provider tree rendering for diagnostics
//!
//! ```text
//! Injector
//! ├── EventBus [Built-in]
//! ├── TpLoader [Built-in]
//! ├── "port"
//! └── Injector (App)
//!     └── App [TpEntry → @TpRoot]
//! ```

use crate::component::ComponentKind;
use crate::config::ConfigData;
use crate::events::EventBus;
use crate::injector::{Injector, WeakInjector};
use crate::provider::Provider;
use crate::token::Token;
use crate::tp_loader::TpLoader;

/// Render `injector` and everything beneath it.
pub fn print_provider_tree(injector: &Injector) -> String {
    let mut lines = vec![String::from("Injector")];
    print_children(injector, &mut lines, "");
    lines.join("\n")
}

fn print_children(injector: &Injector, lines: &mut Vec<String>, prefix: &str) {
    let providers: Vec<(Token, _)> = injector
        .providers()
        .into_iter()
        .filter(|(token, _)| !token.is::<Injector>() && !token.is::<WeakInjector>())
        .collect();
    let children = injector.children();
    let total = providers.len() + children.len();

    for (index, (token, provider)) in providers.iter().enumerate() {
        lines.push(format!(
            "{prefix}{}{}",
            connector(index + 1 == total),
            describe(token, provider)
        ));
    }

    for (offset, child) in children.iter().enumerate() {
        let last = providers.len() + offset + 1 == total;
        let name = match root_component(child) {
            Some(root) => format!("Injector ({root})"),
            None => String::from("Injector"),
        };
        lines.push(format!("{prefix}{}{name}", connector(last)));
        let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
        print_children(child, lines, &nested);
    }

    if total == 0 {
        lines.push(format!("{prefix}└── (no providers)"));
    }
}

fn connector(last: bool) -> &'static str {
    if last { "└── " } else { "├── " }
}

fn describe(token: &Token, provider: &Provider) -> String {
    let name = match token {
        Token::Name(name) => format!("\"{name}\""),
        other => other.to_string(),
    };
    match label(token, provider) {
        Some(label) => format!("{name} [{label}]"),
        None => name,
    }
}

fn label(token: &Token, provider: &Provider) -> Option<&'static str> {
    if token.is::<ConfigData>() || token.is::<TpLoader>() || token.is::<EventBus>() {
        return Some("Built-in");
    }
    // Only components bound under their own type carry a kind label.
    let class = provider.as_class().filter(|p| p.class().token() == token)?;
    Some(match class.class().kind() {
        ComponentKind::Service => "TpWorker → @TpService",
        ComponentKind::Module => "TpAssembly → @TpModule",
        ComponentKind::Root => "TpEntry → @TpRoot",
    })
}

fn root_component(injector: &Injector) -> Option<&'static str> {
    injector.providers().into_iter().find_map(|(_, provider)| {
        provider
            .as_class()
            .filter(|p| p.class().kind() == ComponentKind::Root)
            .map(|p| p.class().name())
    })
}
