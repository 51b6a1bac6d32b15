//! Command Parser Integration Tests
//!
//! Exercises fenced-block extraction over realistic model output: mixed
//! prose, multiple blocks, concatenated objects, and malformed payloads.

use cellflow::parse_commands;
use cellflow_core::CommandKind;
use serde_json::json;

#[test]
fn test_prose_only_yields_no_commands() {
    let text = "The workbook has three sheets: Vendas, Custos and Resumo.";
    assert!(parse_commands(text).is_empty());
}

#[test]
fn test_mixed_prose_and_blocks_keeps_order() {
    let text = concat!(
        "First I will check the sheets.\n",
        "```query\n",
        "{\"operation\": \"list_sheets\"}\n",
        "```\n",
        "Then write the header.\n",
        "```action\n",
        "{\"operation\": \"write_cell\", \"sheet\": \"Vendas\", \"cell\": \"A1\", \"value\": \"Total\"}\n",
        "```\n",
        "Done.",
    );
    let commands = parse_commands(text);
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].kind, CommandKind::Query);
    assert_eq!(commands[0].operation(), Some("list_sheets"));
    assert_eq!(commands[1].kind, CommandKind::Action);
    assert_eq!(commands[1].payload["cell"], json!("A1"));
}

#[test]
fn test_concatenated_objects_in_one_block() {
    let text = concat!(
        "```action\n",
        "{\"operation\": \"create_sheet\", \"name\": \"Q1\"}\n",
        "{\"operation\": \"create_sheet\", \"name\": \"Q2\"}\n",
        "```",
    );
    let commands = parse_commands(text);
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].payload["name"], json!("Q1"));
    assert_eq!(commands[1].payload["name"], json!("Q2"));
}

#[test]
fn test_malformed_fragments_cost_only_themselves() {
    // Two well-formed fragments interleaved with two malformed ones, in
    // the same block and across blocks
    let text = concat!(
        "```action\n",
        "{\"operation\": \"write_cell\", \"sheet\": \"S\", not json\n",
        "{\"operation\": \"create_sheet\", \"name\": \"Q1\"}\n",
        "{broken again}\n",
        "```\n",
        "```query\n",
        "{\"operation\": \"get_used_range\", \"sheet\": \"S\"}\n",
        "```",
    );
    let commands = parse_commands(text);
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].operation(), Some("create_sheet"));
    assert_eq!(commands[1].operation(), Some("get_used_range"));
}

#[test]
fn test_foreign_fence_tags_ignored() {
    let text = concat!(
        "```python\n",
        "print(\"hello\")\n",
        "```\n",
        "```json\n",
        "{\"operation\": \"list_sheets\"}\n",
        "```",
    );
    assert!(parse_commands(text).is_empty());
}

#[test]
fn test_unclosed_block_parsed_to_end() {
    let text = "```action\n{\"operation\": \"autofit\", \"sheet\": \"S\"}\n";
    let commands = parse_commands(text);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].operation(), Some("autofit"));
}

#[test]
fn test_parsed_command_carries_mutation_flag() {
    let text = concat!(
        "```action\n",
        "{\"operation\": \"delete_sheet\", \"name\": \"Old\"}\n",
        "```",
    );
    let commands = parse_commands(text);
    assert!(commands[0].is_mutating());
}
