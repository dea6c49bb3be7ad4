//! The builtin instruction set and the manual container.
//!
//! Everything here implements the node contract from `manuscript-core` and
//! registers itself into a [`Registries`] bundle via
//! [`Registries::with_builtins`]. Plugins extend the same bundle with their
//! own var types, accessors, and decoders before any manual is decoded.

pub mod accessor;
pub mod flow;
pub mod literal;
pub mod logic;
pub mod manual;
pub mod math;
pub mod registries;
pub mod variables;

pub use accessor::{CallStmt, FieldExpr, MethodExpr, SetFieldStmt};
pub use flow::{ForStmt, IfBranch, IfStmt, ReturnStmt, TernaryExpr, WhileStmt};
pub use literal::{BoolExpr, ListExpr, NewVec2Expr, NumberExpr, StringExpr, Vec2Expr};
pub use logic::{EqualityExpr, LogicExpr, LogicOp, NotExpr};
pub use manual::{CompiledManual, Manual};
pub use math::{ArithOp, BinaryExpr, CompareExpr, CompareOp, PowExpr, SqrtExpr};
pub use registries::Registries;
pub use variables::{AssignStmt, VarDeclStmt, VarExpr};
