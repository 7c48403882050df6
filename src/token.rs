//! Tokens identify requestable dependencies.
//!
//! A token is compared by identity: two type tokens are equal when their
//! `TypeId`s match, two symbol tokens only when they come from the same
//! [`Token::symbol`] call. Name tokens compare by string value, which is
//! the identity of a string key.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque key identifying a requestable dependency.
#[derive(Clone)]
pub enum Token {
    /// A Rust type, the usual key for components and typed values.
    Type {
        /// TypeId of the keyed type
        id: TypeId,
        /// Full type name, used for diagnostics only
        name: &'static str,
    },
    /// A string key.
    Name(Arc<str>),
    /// A unique key carrying a description, like a JavaScript symbol.
    Symbol {
        /// Unique ordinal
        id: u64,
        /// Human-readable description
        desc: Arc<str>,
    },
    /// A dependency whose type could not be determined.
    ///
    /// Never resolvable; renders as `undefined` in messages.
    Undefined,
}

impl Token {
    /// Token for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// String token.
    #[inline]
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    /// Fresh symbol token. Every call yields a token unequal to all others.
    pub fn symbol(desc: impl Into<Arc<str>>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Token::Symbol {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            desc: desc.into(),
        }
    }

    /// Whether this token can never be bound (undefined or empty name).
    #[inline]
    pub fn is_falsy(&self) -> bool {
        match self {
            Token::Undefined => true,
            Token::Name(name) => name.is_empty(),
            _ => false,
        }
    }

    /// Whether this token keys type `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        matches!(self, Token::Type { id, .. } if *id == TypeId::of::<T>())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type { id: a, .. }, Token::Type { id: b, .. }) => a == b,
            (Token::Name(a), Token::Name(b)) => a == b,
            (Token::Symbol { id: a, .. }, Token::Symbol { id: b, .. }) => a == b,
            (Token::Undefined, Token::Undefined) => true,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Token::Type { id, .. } => id.hash(state),
            Token::Name(name) => name.hash(state),
            Token::Symbol { id, .. } => id.hash(state),
            Token::Undefined => {}
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => f.write_str(short_type_name(name)),
            Token::Name(name) => f.write_str(first_line(name)),
            Token::Symbol { desc, .. } => write!(f, "Symbol({desc})"),
            Token::Undefined => f.write_str("undefined"),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => write!(f, "Token::Type({name})"),
            Token::Name(name) => write!(f, "Token::Name({name:?})"),
            Token::Symbol { id, desc } => write!(f, "Token::Symbol({id}, {desc:?})"),
            Token::Undefined => f.write_str("Token::Undefined"),
        }
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::name(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::name(name)
    }
}

/// Render a token for messages.
#[inline]
pub fn stringify(token: &Token) -> String {
    token.to_string()
}

/// Strip module paths and generic arguments: `app::db::Pool<u8>` -> `Pool`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(idx) => &full[..idx],
        None => full,
    };
    base.rsplit("::").next().unwrap_or(base)
}

fn first_line(text: &str) -> &str {
    text.split('\n').next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Database;

    #[test]
    fn test_type_tokens_compare_by_type() {
        assert_eq!(Token::of::<Database>(), Token::of::<Database>());
        assert_ne!(Token::of::<Database>(), Token::of::<String>());
    }

    #[test]
    fn test_symbols_are_unique() {
        let a = Token::symbol("same");
        let b = Token::symbol("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&Token::of::<Database>()), "Database");
        assert_eq!(stringify(&Token::of::<Vec<Database>>()), "Vec");
        assert_eq!(stringify(&Token::name("some string")), "some string");
        assert_eq!(stringify(&Token::name("first\nsecond")), "first");
        assert_eq!(stringify(&Token::symbol("some symbol")), "Symbol(some symbol)");
        assert_eq!(stringify(&Token::Undefined), "undefined");
    }

    #[test]
    fn test_falsy_tokens() {
        assert!(Token::Undefined.is_falsy());
        assert!(Token::name("").is_falsy());
        assert!(!Token::name("a").is_falsy());
        assert!(!Token::of::<Database>().is_falsy());
    }
}
