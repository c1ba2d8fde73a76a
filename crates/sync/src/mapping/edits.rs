use lsp_types::FormattingOptions;

/// Rewrites the leading whitespace of each line to the caller's indentation style.
///
/// The first line is only touched when the edit starts at column 0, since its
/// leading whitespace otherwise continues an existing line.
pub(crate) fn normalize_indentation(text: &str, options: &FormattingOptions, first_line_is_indent: bool) -> String {
	let tab_size = (options.tab_size as usize).max(1);
	let mut out = String::with_capacity(text.len());

	for (idx, line) in text.split('\n').enumerate() {
		if idx > 0 {
			out.push('\n');
		}
		if idx == 0 && !first_line_is_indent {
			out.push_str(line);
			continue;
		}

		let body = line.trim_start_matches([' ', '\t']);
		let indent = &line[..line.len() - body.len()];
		let width = indent
			.chars()
			.fold(0, |col, c| if c == '\t' { col + tab_size - col % tab_size } else { col + 1 });

		if options.insert_spaces {
			out.extend(std::iter::repeat_n(' ', width));
		} else {
			out.extend(std::iter::repeat_n('\t', width / tab_size));
			out.extend(std::iter::repeat_n(' ', width % tab_size));
		}
		out.push_str(body);
	}

	out
}
