//! Dependency declarations and their resolution to providers
//!
//! A component declares its constructor arguments as a list of [`Dep`]s.
//! [`get_providers`] looks each one up in an injector and pairs it with the
//! provider that will produce it, failing early on anything required that
//! nobody provides.

use crate::injector::Injector;
use crate::provider::Provider;
use crate::token::{Token, stringify};
use crate::{DiError, Result};
use ahash::AHashSet;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::error;

/// One declared constructor argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dep {
    /// Effective token, after any `inject` override
    pub token: Token,
    /// Resolve to nothing instead of failing when unbound
    pub optional: bool,
    /// Extra annotations carried alongside the token
    pub decorators: Vec<String>,
}

impl Dep {
    /// Dependency on type `T`.
    #[inline]
    pub fn on<T: ?Sized + 'static>() -> Self {
        Self::token(Token::of::<T>())
    }

    /// Dependency on an explicit token.
    #[inline]
    pub fn token(token: impl Into<Token>) -> Self {
        Self {
            token: token.into(),
            optional: false,
            decorators: Vec::new(),
        }
    }

    /// Dependency whose type could not be determined. Never resolves.
    #[inline]
    pub fn undefined() -> Self {
        Self::token(Token::Undefined)
    }

    /// Resolve to nothing when unbound.
    #[inline]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Look up `token` instead of the declared type.
    #[inline]
    pub fn inject(mut self, token: impl Into<Token>) -> Self {
        self.token = token.into();
        self
    }

    /// Attach an annotation.
    #[inline]
    pub fn decorated(mut self, name: impl Into<String>) -> Self {
        self.decorators.push(name.into());
        self
    }
}

impl From<Token> for Dep {
    fn from(token: Token) -> Self {
        Dep::token(token)
    }
}

/// A dependency paired with the provider that satisfies it.
///
/// `provider` is `None` for an unbound optional dependency or an excluded token.
#[derive(Debug, Clone)]
pub struct ParamDeps {
    pub token: Token,
    pub optional: bool,
    pub decorators: Vec<String>,
    pub provider: Option<Arc<Provider>>,
}

/// Resolve `deps` against `injector`.
///
/// Tokens in `excepts` are carried through without lookup. Every provider
/// found is marked used. `position` names the dependent in error messages.
pub fn get_providers(
    deps: &[Dep],
    position: &str,
    injector: &Injector,
    excepts: Option<&AHashSet<Token>>,
) -> Result<Vec<ParamDeps>> {
    deps.iter()
        .enumerate()
        .map(|(index, dep)| {
            if dep.token == Token::Undefined {
                #[cfg(feature = "logging")]
                error!(
                    target: "tarpit",
                    "type 'undefined' at {position}[{index}], \
                     if it's not specified, there maybe a circular import."
                );
            }

            let provider = if excepts.is_some_and(|set| set.contains(&dep.token)) {
                None
            } else {
                match injector.get(&dep.token) {
                    Some(provider) => {
                        provider.set_used();
                        Some(provider)
                    }
                    None if dep.optional => None,
                    None => return Err(DiError::not_found(stringify(&dep.token), position, index)),
                }
            };

            Ok(ParamDeps {
                token: dep.token.clone(),
                optional: dep.optional,
                decorators: dep.decorators.clone(),
                provider,
            })
        })
        .collect()
}

/// Position string for a method: `Owner.method`.
#[inline]
pub fn method_position(owner: &str, method: &str) -> String {
    format!("{owner}.{method}")
}
