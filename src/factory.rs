//! Provider definitions and resolved constructor arguments
//!
//! A [`ProviderDef`] is the declarative description found in a module's
//! `providers` list. The loader turns each one into a live
//! [`Provider`](crate::Provider) bound in an injector.
//!
//! [`Args`] is what a component constructor or factory receives: one slot
//! per declared dependency, already created, in declaration order.

use crate::component::{Component, ComponentRef};
use crate::provider::Instance;
use crate::resolver::Dep;
use crate::token::{Token, short_type_name};
use crate::{DiError, Result};
use std::sync::Arc;

/// Type-erased factory function.
pub type FactoryFn = Arc<dyn Fn(&Args) -> Result<Instance> + Send + Sync>;

// =============================================================================
// Args
// =============================================================================

/// Resolved dependencies handed to a constructor.
///
/// A slot is empty when its dependency was optional and unavailable, or
/// when its token was excluded from resolution.
pub struct Args {
    position: String,
    values: Vec<Option<Instance>>,
    tokens: Vec<Token>,
}

impl Args {
    pub(crate) fn new(position: String, values: Vec<Option<Instance>>, tokens: Vec<Token>) -> Self {
        Self {
            position,
            values,
            tokens,
        }
    }

    /// Position of the dependent in the resolution path, e.g. `App -> Db`.
    #[inline]
    pub fn position(&self) -> &str {
        &self.position
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Token requested at `index`.
    #[inline]
    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Raw instance at `index`.
    #[inline]
    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Required argument at `index`.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.optional(index)?.ok_or_else(|| DiError::MissingArgument {
            position: self.position.clone(),
            index,
        })
    }

    /// Optional argument at `index`; `None` when it was not provided.
    pub fn optional<T: Send + Sync + 'static>(&self, index: usize) -> Result<Option<Arc<T>>> {
        match self.instance(index) {
            Some(value) => Arc::clone(value)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch {
                    expected: short_type_name(std::any::type_name::<T>()),
                    index,
                }),
            None => Ok(None),
        }
    }

    /// Every value of a multi binding at `index`, in registration order.
    pub fn all<T: Send + Sync + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        let values = self.get::<Vec<Instance>>(index)?;
        values
            .iter()
            .map(|value| {
                Arc::clone(value).downcast::<T>().map_err(|_| DiError::TypeMismatch {
                    expected: short_type_name(std::any::type_name::<T>()),
                    index,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("position", &self.position)
            .field("tokens", &self.tokens)
            .finish()
    }
}

// =============================================================================
// Provider Definitions
// =============================================================================

/// Declarative provider, as listed in a module.
#[derive(Clone)]
pub enum ProviderDef {
    /// Constant value; `multi` appends to a multi binding instead.
    Value {
        token: Token,
        value: Instance,
        multi: bool,
        root: bool,
    },
    /// Function of resolved dependencies.
    Factory {
        token: Token,
        deps: Vec<Dep>,
        factory: FactoryFn,
        singleton: bool,
        root: bool,
    },
    /// Service component bound under an explicit token.
    Class {
        token: Token,
        class: ComponentRef,
        root: bool,
    },
    /// Component bound under its own type.
    Component(ComponentRef),
}

impl ProviderDef {
    /// Value bound to `token`.
    pub fn value<T: Send + Sync + 'static>(token: impl Into<Token>, value: T) -> Self {
        ProviderDef::Value {
            token: token.into(),
            value: Arc::new(value),
            multi: false,
            root: false,
        }
    }

    /// Value bound to its own type.
    pub fn value_of<T: Send + Sync + 'static>(value: T) -> Self {
        Self::value(Token::of::<T>(), value)
    }

    /// Value appended to the multi binding of `token`.
    pub fn multi<T: Send + Sync + 'static>(token: impl Into<Token>, value: T) -> Self {
        ProviderDef::Value {
            token: token.into(),
            value: Arc::new(value),
            multi: true,
            root: false,
        }
    }

    /// Factory bound to `token`, called on every resolve.
    pub fn factory<T, F>(token: impl Into<Token>, deps: Vec<Dep>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        ProviderDef::Factory {
            token: token.into(),
            deps,
            factory: Arc::new(move |args| factory(args).map(|v| Arc::new(v) as Instance)),
            singleton: false,
            root: false,
        }
    }

    /// Service `class` bound under `token`.
    pub fn class(token: impl Into<Token>, class: ComponentRef) -> Self {
        ProviderDef::Class {
            token: token.into(),
            class,
            root: false,
        }
    }

    /// Component `C` bound under its own type.
    pub fn component<C: Component>() -> Self {
        ProviderDef::Component(ComponentRef::of::<C>())
    }

    /// Register in the root injector regardless of where it is listed.
    pub fn root(mut self) -> Self {
        match &mut self {
            ProviderDef::Value { root, .. }
            | ProviderDef::Factory { root, .. }
            | ProviderDef::Class { root, .. } => *root = true,
            ProviderDef::Component(_) => {}
        }
        self
    }

    /// Reuse the first factory result. No effect on other definitions.
    pub fn singleton(mut self) -> Self {
        if let ProviderDef::Factory { singleton, .. } = &mut self {
            *singleton = true;
        }
        self
    }

    /// Token this definition binds.
    pub fn token(&self) -> Token {
        match self {
            ProviderDef::Value { token, .. }
            | ProviderDef::Factory { token, .. }
            | ProviderDef::Class { token, .. } => token.clone(),
            ProviderDef::Component(class) => class.token().clone(),
        }
    }
}

impl From<ComponentRef> for ProviderDef {
    fn from(class: ComponentRef) -> Self {
        ProviderDef::Component(class)
    }
}

impl std::fmt::Debug for ProviderDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ProviderDef::Value { multi: true, .. } => "Multi",
            ProviderDef::Value { .. } => "Value",
            ProviderDef::Factory { .. } => "Factory",
            ProviderDef::Class { .. } => "Class",
            ProviderDef::Component(_) => "Component",
        };
        f.debug_struct("ProviderDef")
            .field("kind", &kind)
            .field("token", &self.token())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: Vec<Option<Instance>>) -> Args {
        let tokens = values.iter().map(|_| Token::name("t")).collect();
        Args::new("Owner".into(), values, tokens)
    }

    #[test]
    fn test_get_downcasts() {
        let args = args(vec![Some(Arc::new(7u16))]);
        assert_eq!(*args.get::<u16>(0).unwrap(), 7);
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_get_missing_reports_position() {
        let args = args(vec![None]);
        let err = args.get::<u16>(0).unwrap_err();
        assert_eq!(err.to_string(), "Missing argument at {Owner[0]}");
        assert!(args.optional::<u16>(0).unwrap().is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let args = args(vec![Some(Arc::new("text"))]);
        let err = args.get::<u16>(0).unwrap_err();
        assert!(matches!(err, DiError::TypeMismatch { expected: "u16", index: 0 }));
    }

    #[test]
    fn test_all_unpacks_multi() {
        let multi: Vec<Instance> = vec![Arc::new(1u8), Arc::new(2u8)];
        let args = args(vec![Some(Arc::new(multi))]);
        let values: Vec<u8> = args.all::<u8>(0).unwrap().iter().map(|v| **v).collect();
        assert_eq!(values, [1, 2]);
    }

    #[test]
    fn test_def_builders() {
        let def = ProviderDef::factory("f", vec![], |_| Ok(1u8)).singleton().root();
        assert!(matches!(
            def,
            ProviderDef::Factory {
                singleton: true,
                root: true,
                ..
            }
        ));
        assert_eq!(def.token(), Token::name("f"));

        let def = ProviderDef::multi("m", 1u8);
        assert!(matches!(def, ProviderDef::Value { multi: true, .. }));
    }
}
