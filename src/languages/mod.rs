//! Built-in language plugins.
//!
//! Each module implements [`LanguageProvider`] for one grammar: the handler
//! table that turns CST nodes into elements, the decision points counted for
//! complexity, and the named query library.

pub mod bash;
pub mod c;
pub mod common;
pub mod cpp;
pub mod csharp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod ruby;
pub mod rust_lang;
pub mod scala;
pub mod swift;
pub mod typescript;

use crate::plugin::LanguageProvider;

/// Providers for every built-in language, in registration order.
///
/// Order matters for shared extensions: `.h` resolves to C when content
/// sniffing is inconclusive because C is registered before C++.
pub fn builtin() -> Vec<Box<dyn LanguageProvider>> {
    vec![
        Box::new(python::Python),
        Box::new(javascript::JavaScript),
        Box::new(typescript::TypeScript { tsx: false }),
        Box::new(typescript::TypeScript { tsx: true }),
        Box::new(java::Java),
        Box::new(go::Go),
        Box::new(c::C),
        Box::new(cpp::Cpp),
        Box::new(rust_lang::Rust),
        Box::new(scala::Scala),
        Box::new(swift::Swift),
        Box::new(csharp::CSharp),
        Box::new(ruby::Ruby),
        Box::new(bash::Bash),
    ]
}
