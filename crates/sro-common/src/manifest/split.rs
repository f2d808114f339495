//! Multi-document manifest decomposition
//!
//! Splits a manifest stream on YAML document separator lines without parsing
//! it. Templating runs on each document's text before structural parsing, so
//! the split has to happen on raw text.

/// One raw document from a manifest stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Document<'a> {
    /// Position of the document among the non-blank documents of the stream
    pub index: usize,
    /// Raw document text, separator lines excluded
    pub text: &'a str,
}

/// Lazy iterator over the documents of a manifest stream.
///
/// Cloning the iterator restarts from the clone point; [`split`] can be called
/// again on the same text to start over. Blank documents (only whitespace) are
/// skipped and do not consume an index.
#[derive(Clone, Debug)]
pub struct Documents<'a> {
    rest: &'a str,
    index: usize,
}

/// Split a manifest stream into its documents.
pub fn split(stream: &str) -> Documents<'_> {
    Documents {
        rest: stream,
        index: 0,
    }
}

impl<'a> Iterator for Documents<'a> {
    type Item = Document<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (text, rest) = next_document(self.rest);
            self.rest = rest;
            if text.trim().is_empty() {
                continue;
            }
            let index = self.index;
            self.index += 1;
            return Some(Document { index, text });
        }
        None
    }
}

fn next_document(input: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if is_separator(line) {
            return (&input[..offset], &input[offset + line.len()..]);
        }
        offset += line.len();
    }
    (input, "")
}

/// A separator is `---` at the start of a line, optionally followed by a comment.
fn is_separator(line: &str) -> bool {
    let line = line.trim_end_matches(['\n', '\r']);
    match line.strip_prefix("---") {
        Some(rest) => {
            let rest = rest.trim();
            rest.is_empty() || rest.starts_with('#')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(stream: &str) -> Vec<&str> {
        split(stream).map(|d| d.text.trim()).collect()
    }

    #[test]
    fn test_single_document() {
        assert_eq!(texts("kind: Namespace\n"), vec!["kind: Namespace"]);
    }

    #[test]
    fn test_documents_in_stream_order() {
        let stream = "---\nkind: ServiceAccount\n---\nkind: Role\n--- # rbac\nkind: RoleBinding\n";
        assert_eq!(
            texts(stream),
            vec!["kind: ServiceAccount", "kind: Role", "kind: RoleBinding"]
        );
    }

    #[test]
    fn test_blank_documents_are_skipped_without_consuming_index() {
        let stream = "---\n\n---\nkind: A\n---\n   \n---\nkind: B\n";
        let docs: Vec<_> = split(stream).collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].index, 0);
        assert_eq!(docs[1].index, 1);
        assert_eq!(docs[1].text.trim(), "kind: B");
    }

    #[test]
    fn test_separator_requires_line_start() {
        let stream = "data:\n  banner: \"---\"\n  text: |\n    a\n    ---x\n";
        assert_eq!(split(stream).count(), 1);
    }

    #[test]
    fn test_crlf_separators() {
        assert_eq!(split("kind: A\r\n---\r\nkind: B\r\n").count(), 2);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let docs = split("kind: A\n---\nkind: B\n");
        let mut first = docs.clone();
        assert_eq!(first.next().map(|d| d.index), Some(0));
        assert_eq!(docs.count(), 2);
        assert_eq!(first.count(), 1);
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(split("").count(), 0);
        assert_eq!(split("---\n---\n").count(), 0);
    }
}
