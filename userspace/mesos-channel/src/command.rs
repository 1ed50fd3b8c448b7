// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command envelope and positional arguments.
//!
//! Both types are immutable once built. The channel never looks past
//! [`Command::name`]; interpreting arguments is up to the receiving side, guided
//! by each argument's type tag.

use core::fmt;

/// Type tag applied when the caller does not name one.
pub const DEFAULT_TYPE_TAG: &str = "String";

/// Shape of an argument payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// A single string.
    Scalar,
    /// An ordered sequence of strings.
    Array,
}

/// Argument payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgValue {
    /// A single string.
    Scalar(String),
    /// An ordered sequence of strings.
    Array(Vec<String>),
}

impl ArgValue {
    /// Returns the payload shape.
    pub const fn kind(&self) -> ArgKind {
        match self {
            Self::Scalar(_) => ArgKind::Scalar,
            Self::Array(_) => ArgKind::Array,
        }
    }
}

/// One positional parameter of a [`Command`].
///
/// `kind` governs the payload shape, the type tag governs how the far side
/// interprets it (`"Int"`, `"StringArray"`, a message type name, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandArg {
    value: ArgValue,
    type_tag: String,
}

impl CommandArg {
    /// Creates a scalar argument tagged [`DEFAULT_TYPE_TAG`].
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::typed(ArgValue::Scalar(value.into()), DEFAULT_TYPE_TAG)
    }

    /// Creates an array argument tagged [`DEFAULT_TYPE_TAG`].
    pub fn array<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::typed(ArgValue::Array(values.into_iter().map(Into::into).collect()), DEFAULT_TYPE_TAG)
    }

    /// Creates an argument with an explicit type tag.
    pub fn typed(value: ArgValue, type_tag: impl Into<String>) -> Self {
        Self { value, type_tag: type_tag.into() }
    }

    /// Packs an already-encoded message as a scalar tagged with its message type.
    pub fn message(encoded: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self::typed(ArgValue::Scalar(encoded.into()), message_type)
    }

    /// Returns a copy of this argument carrying `type_tag` instead.
    pub fn with_type(self, type_tag: impl Into<String>) -> Self {
        Self { value: self.value, type_tag: type_tag.into() }
    }

    /// Returns the payload shape.
    pub const fn kind(&self) -> ArgKind {
        self.value.kind()
    }

    /// Returns the payload.
    pub fn value(&self) -> &ArgValue {
        &self.value
    }

    /// Returns the scalar payload, or `None` for array arguments.
    pub fn scalar_value(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Scalar(value) => Some(value),
            ArgValue::Array(_) => None,
        }
    }

    /// Returns the array payload, or `None` for scalar arguments.
    pub fn array_value(&self) -> Option<&[String]> {
        match &self.value {
            ArgValue::Array(values) => Some(values),
            ArgValue::Scalar(_) => None,
        }
    }

    /// Returns the logical type label.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Splits the argument into payload and type tag.
    pub fn into_parts(self) -> (ArgValue, String) {
        (self.value, self.type_tag)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        Self::scalar(value)
    }
}

impl From<String> for CommandArg {
    fn from(value: String) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<String>> for CommandArg {
    fn from(values: Vec<String>) -> Self {
        Self::typed(ArgValue::Array(values), DEFAULT_TYPE_TAG)
    }
}

impl From<Vec<&str>> for CommandArg {
    fn from(values: Vec<&str>) -> Self {
        Self::array(values)
    }
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ArgValue::Scalar(value) => write!(f, "{value}"),
            ArgValue::Array(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// A named unit of work handed across the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    name: String,
    args: Vec<CommandArg>,
}

impl Command {
    /// Creates a command from a name and its positional arguments.
    pub fn new(name: impl Into<String>, args: Vec<CommandArg>) -> Self {
        Self { name: name.into(), args }
    }

    /// Starts a builder for a command named `name`.
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder { name: name.into(), args: Vec::new() }
    }

    /// Returns the value `recv` hands out once the channel is closed.
    pub fn sentinel() -> Self {
        Self { name: String::new(), args: Vec::new() }
    }

    /// Returns `true` for the closed-channel sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.name.is_empty() && self.args.is_empty()
    }

    /// Returns the command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the positional arguments in declared order.
    pub fn args(&self) -> &[CommandArg] {
        &self.args
    }

    /// Splits the command into name and arguments.
    pub fn into_parts(self) -> (String, Vec<CommandArg>) {
        (self.name, self.args)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Incremental builder for [`Command`]; arguments keep insertion order.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    name: String,
    args: Vec<CommandArg>,
}

impl CommandBuilder {
    /// Appends a prepared argument.
    pub fn arg(mut self, arg: impl Into<CommandArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a scalar argument with the default type tag.
    pub fn scalar(self, value: impl Into<String>) -> Self {
        self.arg(CommandArg::scalar(value))
    }

    /// Appends an array argument with the default type tag.
    pub fn array<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg(CommandArg::array(values))
    }

    /// Appends a scalar argument tagged `type_tag`.
    pub fn typed(self, value: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.arg(CommandArg::typed(ArgValue::Scalar(value.into()), type_tag))
    }

    /// Finishes the command.
    pub fn build(self) -> Command {
        Command { name: self.name, args: self.args }
    }
}
