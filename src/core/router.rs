// src/core/router.rs

use crate::constants::{BACKGROUND_OPERATOR, PIPE_OPERATOR, REDIRECT_OPERATOR};

/// The execution shape selected for one command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Regular,
    Background,
    Pipe,
    Redirect,
}

/// An operator token, recognised by its first character only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Pipe,
    Redirect,
    Background,
}

impl Operator {
    /// Returns the operator a token stands for, if any. `>>`, `|x` and `&&`
    /// count as their first character; nothing is quoted or escaped.
    pub fn of_token(token: &str) -> Option<Self> {
        match token.chars().next()? {
            PIPE_OPERATOR => Some(Self::Pipe),
            REDIRECT_OPERATOR => Some(Self::Redirect),
            BACKGROUND_OPERATOR => Some(Self::Background),
            _ => None,
        }
    }
}

/// A command line split at its operator, with the operands each shape needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Regular {
        command: Vec<String>,
    },
    Background {
        command: Vec<String>,
    },
    Pipe {
        writer: Vec<String>,
        reader: Vec<String>,
    },
    /// `target` is `None` when the line ends right after `>`.
    Redirect {
        command: Vec<String>,
        target: Option<String>,
    },
}

impl Invocation {
    pub fn shape(&self) -> Shape {
        match self {
            Self::Regular { .. } => Shape::Regular,
            Self::Background { .. } => Shape::Background,
            Self::Pipe { .. } => Shape::Pipe,
            Self::Redirect { .. } => Shape::Redirect,
        }
    }
}

/// Position and kind of the first operator token, scanning left to right.
pub fn find_operator(tokens: &[String]) -> Option<(usize, Operator)> {
    tokens
        .iter()
        .enumerate()
        .find_map(|(position, token)| Operator::of_token(token).map(|op| (position, op)))
}

/// Consumes a token sequence and splits it at its first operator.
///
/// Everything from the operator on is cut from the command. A pipe keeps every
/// token after the operator as the reader; a redirect keeps only the one token
/// after it as the target; a background marker keeps nothing.
pub fn route(mut tokens: Vec<String>) -> Invocation {
    let Some((position, operator)) = find_operator(&tokens) else {
        return Invocation::Regular { command: tokens };
    };

    // The operator itself is the first element of the tail and is discarded.
    let mut operands = tokens.split_off(position).into_iter().skip(1);
    log::debug!("Found {:?} operator at position {}.", operator, position);

    match operator {
        Operator::Background => Invocation::Background { command: tokens },
        Operator::Pipe => Invocation::Pipe {
            writer: tokens,
            reader: operands.collect(),
        },
        Operator::Redirect => Invocation::Redirect {
            command: tokens,
            target: operands.next(),
        },
    }
}
