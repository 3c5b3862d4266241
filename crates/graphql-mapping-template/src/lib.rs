//! A small expression tree for Velocity (VTL) mapping templates.
//!
//! Templates are assembled from builder functions and turned into text with
//! [`print`] or [`print_block`]:
//!
//! ```
//! use graphql_mapping_template::{empty_list, method_call, print, qref, reference, string};
//!
//! let expression = qref(method_call(reference("ctx.stash.put"), [string("keys"), empty_list()]));
//! assert_eq!(print(&expression), r#"$util.qr($ctx.stash.put("keys", []))"#);
//! ```

mod builder;
mod printer;

pub use builder::*;
pub use printer::{print, print_block};

/// The version every AppSync resolver template declares.
pub const RESOLVER_VERSION_ID: &str = "2018-05-29";

/// A node of a mapping template.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Printed as is.
    Raw(String),
    /// A variable reference, printed with a leading `$`.
    Reference(String),
    /// `$util.qr(...)`, evaluating the inner expression without output.
    QuietReference(Box<Expression>),
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
    Object(Vec<(String, Expression)>),
    List(Vec<Expression>),
    Set {
        key: Box<Expression>,
        value: Box<Expression>,
    },
    If {
        predicate: Box<Expression>,
        expression: Box<Expression>,
        inline: bool,
    },
    IfElse {
        predicate: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    ForEach {
        key: Box<Expression>,
        collection: Box<Expression>,
        body: Vec<Expression>,
    },
    Compound(Vec<Expression>),
    /// A commented section wrapping its expressions.
    Block {
        name: String,
        expressions: Vec<Expression>,
    },
    MethodCall {
        method: Box<Expression>,
        params: Vec<Expression>,
    },
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Parens(Box<Expression>),
    Not(Box<Expression>),
    Equals(Box<Expression>, Box<Expression>),
    NotEquals(Box<Expression>, Box<Expression>),
    ToJson(Box<Expression>),
    Comment(String),
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&print(self))
    }
}
