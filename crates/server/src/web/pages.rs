//! Minimal HTML pages for the browser front end.

use protocol::messages::{join_path, parent_path};

use crate::files::Listing;

/// Batch download script: fetches a folder's manifest, then triggers one
/// download per file, pausing 1 s between files and 10 s after every 10th.
const BATCH_DOWNLOAD_SCRIPT: &str = r#"<script>
async function batchDownloadFolder(encodedPath) {
  const relPath = decodeURIComponent(encodedPath || "");
  if (!confirm("Download every file in this folder?\n\nPath: /" + relPath)) {
    return;
  }
  try {
    const resp = await fetch("/api/folder-files?path=" + encodeURIComponent(relPath));
    if (!resp.ok) {
      alert("Failed to fetch the file list");
      return;
    }
    const files = (await resp.json()).files || [];
    if (!files.length) {
      alert("This folder contains no files");
      return;
    }
    let idx = 0;
    function next() {
      if (idx >= files.length) {
        return;
      }
      const a = document.createElement("a");
      a.href = "/download?path=" + encodeURIComponent(files[idx]);
      a.target = "_blank";
      a.rel = "noopener";
      document.body.appendChild(a);
      a.click();
      document.body.removeChild(a);
      idx++;
      setTimeout(next, idx % 10 === 0 ? 10000 : 1000);
    }
    next();
  } catch (e) {
    alert("Batch download failed: " + e.message);
  }
}
</script>"#;

const STYLE: &str = r#"<style>
body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
ul { list-style: none; padding: 0; }
li { padding: 0.3rem 0; border-bottom: 1px solid #eee; }
a { text-decoration: none; }
</style>"#;

fn document(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n\
         <title>{}</title>\n{}\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

/// Password form. `failed` adds a retry notice.
pub fn login_page(failed: bool) -> String {
    let notice = if failed {
        "<p><strong>Wrong password, please try again.</strong></p>\n"
    } else {
        ""
    };
    document(
        "Login - dirshare",
        &format!(
            "<h1>dirshare</h1>\n{notice}<form method=\"post\" action=\"/login\">\n\
             <label>Password: <input type=\"password\" name=\"password\" autofocus /></label>\n\
             <button type=\"submit\">Log in</button>\n</form>"
        ),
    )
}

/// Directory listing for `path` (normalized, relative to the root).
pub fn browse_page(path: &str, listing: &Listing) -> String {
    let mut body = String::new();
    body.push_str("<h1>dirshare</h1>\n");
    body.push_str(&format!("<p>Current path: /{}</p>\n", escape_html(path)));
    body.push_str("<p><a href=\"/logout\">Log out</a></p>\n");

    if let Some(parent) = parent_path(path) {
        body.push_str(&format!(
            "<p><a href=\"/browse?path={}\">&larr; Up</a></p>\n",
            urlencoding::encode(&parent)
        ));
    }

    body.push_str("<ul>\n");
    for dir in &listing.dirs {
        let entry_path = join_path(path, &dir.name);
        let encoded = urlencoding::encode(&entry_path);
        body.push_str(&format!(
            "<li>&#128193; <a href=\"/browse?path={encoded}\">{name}</a> \
             - <a href=\"#\" data-path=\"{encoded}\" \
             onclick=\"batchDownloadFolder(this.dataset.path); return false;\">download all</a></li>\n",
            name = escape_html(&dir.name),
        ));
    }
    for file in &listing.files {
        let entry_path = join_path(path, &file.name);
        body.push_str(&format!(
            "<li>&#128196; <a href=\"/download?path={}\">{}</a></li>\n",
            urlencoding::encode(&entry_path),
            escape_html(&file.name)
        ));
    }
    body.push_str("</ul>\n");
    body.push_str(BATCH_DOWNLOAD_SCRIPT);

    document("dirshare", &body)
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::DirectoryEntry;
    use protocol::messages::EntryKind;

    fn listing() -> Listing {
        Listing {
            dirs: vec![DirectoryEntry {
                name: "photos <2024>".to_string(),
                kind: EntryKind::Directory,
            }],
            files: vec![DirectoryEntry {
                name: "a&b.txt".to_string(),
                kind: EntryKind::File,
            }],
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_browse_page_encodes_non_ascii_links() {
        let listing = Listing {
            dirs: vec![],
            files: vec![DirectoryEntry {
                name: "文件 v1~.txt".to_string(),
                kind: EntryKind::File,
            }],
        };
        let html = browse_page("", &listing);

        assert!(html.contains("/download?path=%E6%96%87%E4%BB%B6%20v1~.txt"));
    }

    #[test]
    fn test_browse_page_escapes_names() {
        let html = browse_page("docs", &listing());

        assert!(html.contains("photos &lt;2024&gt;"));
        assert!(html.contains("a&amp;b.txt"));
        assert!(!html.contains("<2024>"));
        assert!(html.contains("/browse?path=docs%2Fphotos%20%3C2024%3E"));
        assert!(html.contains("/download?path=docs%2Fa%26b.txt"));
    }

    #[test]
    fn test_browse_page_parent_link() {
        let root = browse_page("", &Listing::default());
        assert!(!root.contains("&larr; Up"));

        let nested = browse_page("a/b", &Listing::default());
        assert!(nested.contains("/browse?path=a\">&larr; Up"));
    }

    #[test]
    fn test_login_page() {
        assert!(!login_page(false).contains("Wrong password"));
        assert!(login_page(true).contains("Wrong password"));
        assert!(login_page(false).contains("action=\"/login\""));
    }
}
