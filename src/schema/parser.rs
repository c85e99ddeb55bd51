// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 .msg definition parser using Pest.
//!
//! Only the root message is parsed. Connection records embed the full
//! definition including dependency blocks (`MSG: pkg/Type` after a line of
//! `=` characters); those blocks describe nested types and are not needed to
//! decide the layout of the root message's leading fields.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::core::{BagError, Result};

use super::{FieldDecl, MessageDefinition};

/// Pest parser for ROS1 .msg definitions.
#[derive(Parser)]
#[grammar = "schema/msg.pest"] // Path relative to src/ directory
pub struct MsgParser;

/// Return the root section of a definition: everything before the first
/// separator line (`===...`).
pub fn root_section(definition: &str) -> &str {
    let mut offset = 0;
    for line in definition.split_inclusive('\n') {
        if line.trim_start().starts_with("===") {
            return &definition[..offset];
        }
        offset += line.len();
    }
    definition
}

/// Parse the root message of a ROS1 definition.
pub fn parse(definition: &str) -> Result<MessageDefinition> {
    let root = root_section(definition);

    let pairs = MsgParser::parse(Rule::definition, root)
        .map_err(|e| BagError::input("msg definition", format!("{e}")))?;

    let mut parsed = MessageDefinition::default();

    for pair in pairs {
        for item in pair.into_inner() {
            if item.as_rule() == Rule::field {
                if let Some(field) = parse_field(item) {
                    parsed.fields.push(field);
                }
            }
        }
    }

    Ok(parsed)
}

/// Split a `field_type` pair into its base type and array marker.
fn split_field_type(pair: Pair<Rule>) -> (String, bool) {
    let mut base_type = String::new();
    let mut is_array = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::type_name => base_type = part.as_str().to_string(),
            Rule::array_spec => is_array = true,
            _ => {}
        }
    }
    (base_type, is_array)
}

fn parse_field(pair: Pair<Rule>) -> Option<FieldDecl> {
    let mut inner = pair.into_inner();
    let (base_type, is_array) = split_field_type(inner.next()?);
    let name = inner.next()?.as_str().to_string();
    Some(FieldDecl {
        base_type,
        is_array,
        name,
    })
}
