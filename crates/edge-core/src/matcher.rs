use crate::models::{Snippet, WorkspaceId};

/// Find the first snippet whose trigger matches `word` and that is visible
/// from `workspace`.
///
/// `candidates` is expected in index order (project before global, exact
/// language before `"*"`), so the first hit is the one with precedence.
pub fn find_snippet<'a, I>(
    candidates: I,
    word: &str,
    workspace: Option<&WorkspaceId>,
) -> Option<&'a Snippet>
where
    I: IntoIterator<Item = &'a Snippet>,
{
    candidates
        .into_iter()
        .find(|snippet| snippet.is_visible_in(workspace) && snippet.matches(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(prefix: &str, body: &str, workspace: Option<&str>) -> Snippet {
        Snippet::new("rust", prefix, body, "/s/rust.json", workspace.map(WorkspaceId::new)).unwrap()
    }

    #[test]
    fn first_visible_match_wins() {
        let snippets = vec![
            snippet("fn", "other workspace", Some("/b")),
            snippet("fn", "this workspace", Some("/a")),
            snippet("fn", "global", None),
        ];

        let here = WorkspaceId::new("/a");
        let found = find_snippet(&snippets, "fn", Some(&here)).unwrap();
        assert_eq!(found.body, "this workspace");

        let found = find_snippet(&snippets, "fn", None).unwrap();
        assert_eq!(found.body, "global");
    }

    #[test]
    fn no_match_is_none() {
        let snippets = vec![snippet("fn", "global", None)];
        assert!(find_snippet(&snippets, "fun", None).is_none());
        assert!(find_snippet(&snippets, "xfn", None).is_none());
    }

    #[test]
    fn matching_is_stable_across_calls() {
        let snippets = vec![snippet("ab", "first", None), snippet("b", "second", None)];
        for _ in 0..3 {
            assert_eq!(find_snippet(&snippets, "ab", None).unwrap().body, "first");
            assert_eq!(find_snippet(&snippets, "x.b", None).unwrap().body, "second");
        }
    }
}
