//! Pagination for plain-text documents.
//!
//! A page holds at most `lines_per_page` wrapped lines of `chars_per_line`
//! characters. Paragraphs are never split: one that does not fit on the
//! current page starts the next one, and a paragraph longer than a whole page
//! gets a page to itself.

/// Split the provided text into pages. Blank text yields no pages.
pub fn paginate(text: &str, chars_per_line: usize, lines_per_page: usize) -> Vec<String> {
    let chars_per_line = chars_per_line.max(1);
    let lines_per_page = lines_per_page.max(1);

    let mut pages = Vec::new();
    let mut current = String::new();
    let mut used_lines = 0usize;

    for para in split_paragraphs(text) {
        let para_lines = wrapped_lines(&para, chars_per_line);
        // One blank line separates paragraphs on the same page.
        if !current.is_empty() && used_lines + 1 + para_lines > lines_per_page {
            pages.push(std::mem::take(&mut current));
            used_lines = 0;
        }

        if current.is_empty() {
            current.push_str(&para);
            used_lines = para_lines;
        } else {
            current.push_str("\n\n");
            current.push_str(&para);
            used_lines += 1 + para_lines;
        }
    }

    if !current.is_empty() {
        pages.push(current);
    }

    pages
}

fn wrapped_lines(paragraph: &str, chars_per_line: usize) -> usize {
    paragraph
        .lines()
        .map(|line| line.chars().count().div_ceil(chars_per_line).max(1))
        .sum()
}

/// Split text into paragraphs separated by blank lines.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join("\n"));
                buffer.clear();
            }
        } else {
            buffer.push(line.trim_end());
        }
    }

    if !buffer.is_empty() {
        paragraphs.push(buffer.join("\n"));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_has_no_pages() {
        assert!(paginate("", 80, 40).is_empty());
        assert!(paginate("\n  \n\t\n", 80, 40).is_empty());
    }

    #[test]
    fn short_text_fits_on_one_page() {
        let pages = paginate("Primeiro parágrafo.\n\n\nSegundo parágrafo.", 80, 40);
        assert_eq!(pages, vec!["Primeiro parágrafo.\n\nSegundo parágrafo."]);
    }

    #[test]
    fn paragraphs_move_whole_to_the_next_page() {
        // Each paragraph wraps to two lines of ten chars.
        let para = "abcdefghij klmnopqr";
        let text = [para, para, para].join("\n\n");
        let pages = paginate(&text, 10, 5);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], format!("{para}\n\n{para}"));
        assert_eq!(pages[1], para);
    }

    #[test]
    fn oversized_paragraph_gets_its_own_page() {
        let long = "palavra ".repeat(50);
        let text = format!("Curto.\n\n{}\n\nFim.", long.trim());
        let pages = paginate(&text, 20, 4);

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Curto.");
        assert_eq!(pages[1], long.trim());
        assert_eq!(pages[2], "Fim.");
    }

    #[test]
    fn line_width_counts_characters_not_bytes() {
        assert_eq!(wrapped_lines("ããããã", 5), 1);
        assert_eq!(wrapped_lines("ããããã\nb", 5), 2);
    }
}
