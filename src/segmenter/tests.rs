use super::*;

fn sample_manual_text() -> String {
    let mut text = String::new();
    text.push_str("Engine Cooling System\n\n");
    text.push_str(
        "The cooling system maintains engine temperature within the normal operating range. \
         Check coolant level when the engine is cold. Inspect hoses for cracks and leaks.\n\n",
    );
    text.push_str(
        "Overheating may be caused by a failed thermostat, a leaking water pump, or a \
         clogged radiator. Code P0217 indicates an engine overtemperature condition.\n\n",
    );
    text.push_str("Misfire diagnosis\nCylinder 1 misfire is reported as P0301. A repeated P0301 \
         together with P0300 suggests an ignition coil fault.\n");
    text
}

/// Strip the characters the separator hierarchy can consume so that chunk
/// output and original input become comparable.
fn strip_separator_chars(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ' ' && *c != '\n' && *c != '.')
        .collect()
}

#[test]
fn short_text_is_single_piece() {
    let pieces = split_text("Check coolant level.", 100);
    assert_eq!(pieces, vec!["Check coolant level.".to_string()]);
}

#[test]
fn pieces_respect_max_length() {
    let text = sample_manual_text();

    for max_len in [20, 50, 80, 200] {
        for piece in split_text(&text, max_len) {
            assert!(
                piece.chars().count() <= max_len,
                "piece of {} chars exceeds limit {}: {:?}",
                piece.chars().count(),
                max_len,
                piece
            );
        }
    }
}

#[test]
fn content_preserved_modulo_separators() {
    let text = sample_manual_text();

    for max_len in [25, 60, 500] {
        let joined: String = split_text(&text, max_len).concat();
        assert_eq!(
            strip_separator_chars(&text),
            strip_separator_chars(&joined),
            "non-separator characters lost or duplicated at limit {}",
            max_len
        );
    }
}

#[test]
fn unseparated_text_falls_back_to_fixed_slices() {
    let text = "ABCDEFGHIJKLMNOPQRSTUVWXY";
    let pieces = split_text(text, 10);

    assert_eq!(pieces, vec!["ABCDEFGHIJ", "KLMNOPQRST", "UVWXY"]);
}

#[test]
fn multibyte_text_splits_on_character_boundaries() {
    let text = "ığüşöçĞÜŞÖÇİ".repeat(5);
    let pieces = split_text(&text, 7);

    for piece in &pieces {
        assert!(piece.chars().count() <= 7);
    }
    assert_eq!(pieces.concat(), text);
}

#[test]
fn oversized_paragraph_recurses_into_sentences() {
    let text = "First sentence about coolant. Second sentence about hoses. \
                Third sentence about the radiator cap.";
    let pieces = split_text(text, 40);

    assert!(pieces.len() > 1);
    for piece in &pieces {
        assert!(piece.chars().count() <= 40);
    }
}

#[test]
fn blank_input_yields_no_chunks() {
    assert!(segment_document("", "manual.txt", 100).is_empty());
    assert!(segment_document("   \n\n  \t ", "manual.txt", 100).is_empty());
}

#[test]
fn chunks_are_trimmed_and_non_empty() {
    let chunks = segment_document(&sample_manual_text(), "cooling.txt", 80);

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk.content, chunk.content.trim());
        assert!(!chunk.content.is_empty());
        assert_eq!(chunk.source_name, "cooling.txt");
        assert!(chunk.embedding.is_none());
    }
}

#[test]
fn title_is_first_non_blank_line() {
    let chunks = segment_document("Engine Cooling System\nCheck coolant level.", "m.txt", 200);

    assert_eq!(chunks.len(), 1);
    assert_eq!(
        chunks[0].metadata.get(TITLE_KEY).map(String::as_str),
        Some("Engine Cooling System")
    );
}

#[test]
fn long_title_is_truncated_with_marker() {
    let first_line = "A".repeat(60);
    let text = format!("{}\nBody text follows here.", first_line);
    let chunks = segment_document(&text, "m.txt", 500);

    let title = chunks[0].metadata.get(TITLE_KEY).expect("title is set");
    assert_eq!(title.chars().count(), 53);
    assert!(title.ends_with("..."));
    assert!(title.starts_with("AAAA"));
}

#[test]
fn trouble_codes_extracted_and_deduplicated() {
    let text = "Misfire P0301 detected. P0301 repeats together with P0300 and body code B1342.";
    let chunks = segment_document(text, "m.txt", 500);

    assert_eq!(
        chunks[0].metadata.get(ERROR_CODES_KEY).map(String::as_str),
        Some("P0301,P0300,B1342")
    );
}

#[test]
fn trouble_code_match_is_word_bounded() {
    let text = "Values P03011 and XP0301 are not trouble codes, but U0100 is.";
    let chunks = segment_document(text, "m.txt", 500);

    assert_eq!(
        chunks[0].metadata.get(ERROR_CODES_KEY).map(String::as_str),
        Some("U0100")
    );
}

#[test]
fn error_codes_omitted_when_absent() {
    let chunks = segment_document("No codes in this text.", "m.txt", 500);

    assert!(chunks[0].metadata.get(ERROR_CODES_KEY).is_none());
    assert!(chunks[0].metadata.contains_key(TITLE_KEY));
}
