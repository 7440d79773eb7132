// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use sazon::constants::{file_formats, get_resolution_label, recipes, storage, vision};

#[test]
fn test_capture_slot_is_png() {
    assert_eq!(storage::CAPTURE_FILE_STEM, "captured_image");
    assert_eq!(vision::PNG_MIME_TYPE, "image/png");
}

#[test]
fn test_instruction_demands_json_array() {
    assert!(vision::JSON_ARRAY_INSTRUCTION.contains("JSON array of strings"));
}

#[test]
fn test_recipe_paths() {
    assert_eq!(recipes::FIND_BY_INGREDIENTS_PATH, "/recipes/findByIngredients");
    assert_eq!(
        recipes::analyzed_instructions_path(716429),
        "/recipes/716429/analyzedInstructions"
    );
}

#[test]
fn test_resolution_labels() {
    assert_eq!(get_resolution_label(3840), Some("4K"));
    assert_eq!(get_resolution_label(1280), Some("720p"));
    assert_eq!(get_resolution_label(320), None);
}

#[test]
fn test_image_extensions() {
    assert!(file_formats::is_image_extension("PNG"));
    assert!(file_formats::is_image_extension("jpeg"));
    assert!(!file_formats::is_image_extension("gif"));
}
