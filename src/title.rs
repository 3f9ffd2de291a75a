/// Turn `::` path separators into `/`.
pub fn clean_title_path(title: &str) -> String {
	title.replace("::", "/")
}

/// Drop every `/`-separated segment equal to the one kept before it.
pub fn collapse_duplicate_segments(path: &str) -> String {
	let mut kept: Vec<&str> = Vec::new();
	for segment in path.split('/') {
		if kept.last() != Some(&segment) {
			kept.push(segment);
		}
	}
	kept.join("/")
}

/// Normalize a caller-supplied item title, e.g. `A::B::B::C` to `A/B/C`.
pub fn normalize_title(title: &str) -> String {
	collapse_duplicate_segments(&clean_title_path(title))
}
