// src/meals/import/maildir.rs
//! Order confirmation inbox backed by a maildir.
//!
//! Unread messages are files in `<root>/new`. Reading a message moves it to
//! `<root>/cur` with the `:2,S` (seen) flag, the same convention mail clients
//! use, so the directory can be fed by any MDA (fetchmail, getmail, mbsync).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use mailparse::{MailHeaderMap, ParsedMail};
use regex::Regex;
use tracing::{debug, info, warn};

use super::ImportError;

/// Which messages count as order confirmations
#[derive(Debug, Clone)]
pub struct InboxFilter {
    pub sender: String,
    pub subject: String,
    pub max_age: Duration,
}

impl Default for InboxFilter {
    fn default() -> Self {
        Self {
            sender: "team@mymusclechef.com.au".to_string(),
            subject: "order confirmation".to_string(),
            max_age: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

/// A parsed message
#[derive(Debug, Clone)]
pub struct InboxMessage {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub received: SystemTime,
}

#[derive(Debug, Clone)]
pub struct MaildirInbox {
    root: PathBuf,
    filter: InboxFilter,
}

impl MaildirInbox {
    pub fn new(root: impl Into<PathBuf>, filter: InboxFilter) -> Self {
        Self { root: root.into(), filter }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `new/`, `cur/` and `tmp/` if missing
    pub fn ensure_directories(&self) -> io::Result<()> {
        for sub in ["new", "cur", "tmp"] {
            fs::create_dir_all(self.root.join(sub))?;
        }
        Ok(())
    }

    /// Newest unread message matching the filter
    pub fn latest_unread(&self) -> Result<Option<InboxMessage>, ImportError> {
        let new_dir = self.root.join("new");
        if !new_dir.exists() {
            debug!("Inbox {:?} has no new/ directory", self.root);
            return Ok(None);
        }

        let cutoff = SystemTime::now()
            .checked_sub(self.filter.max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut candidates: Vec<InboxMessage> = Vec::new();
        for entry in fs::read_dir(&new_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let received = entry.metadata()?.modified()?;
            if received < cutoff {
                continue;
            }
            match read_message(&path, received) {
                Ok(message) if self.matches(&message) => candidates.push(message),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable message {:?}: {}", path.file_name(), e),
            }
        }

        candidates.sort_by(|a, b| b.received.cmp(&a.received).then_with(|| b.id.cmp(&a.id)));
        Ok(candidates.into_iter().next())
    }

    /// Move a message from `new/` to `cur/` with the seen flag
    pub fn mark_read(&self, id: &str) -> Result<(), ImportError> {
        let from = self.root.join("new").join(id);
        if !from.exists() {
            return Err(ImportError::MessageNotFound(id.to_string()));
        }
        let cur = self.root.join("cur");
        fs::create_dir_all(&cur)?;
        fs::rename(&from, cur.join(format!("{}:2,S", id)))?;
        info!("Marked message {} as read", id);
        Ok(())
    }

    fn matches(&self, message: &InboxMessage) -> bool {
        contains_ignore_case(&message.from, &self.filter.sender)
            && contains_ignore_case(&message.subject, &self.filter.subject)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Read a message file. The id is the file name.
pub fn read_message(path: &Path, received: SystemTime) -> Result<InboxMessage, ImportError> {
    let raw = fs::read(path)?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (from, subject, body) = parse_message(&raw)?;
    Ok(InboxMessage { id, from, subject, body, received })
}

/// Decode a raw RFC 822 message into (From, Subject, plain-text body).
///
/// The first `text/plain` part wins. HTML-only messages are flattened to text,
/// one line per block element. Transfer encodings and charsets are decoded.
pub fn parse_message(raw: &[u8]) -> Result<(String, String, String), ImportError> {
    let mail = mailparse::parse_mail(raw)?;
    let from = mail.headers.get_first_value("From").unwrap_or_default();
    let subject = mail.headers.get_first_value("Subject").unwrap_or_default();

    let body = if let Some(part) = find_part(&mail, "text/plain") {
        part.get_body()?
    } else if let Some(part) = find_part(&mail, "text/html") {
        html_to_text(&part.get_body()?)
    } else {
        mail.get_body()?
    };
    Ok((from, subject, body.replace("\r\n", "\n")))
}

fn find_part<'a>(mail: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        return (mail.ctype.mimetype == mimetype).then_some(mail);
    }
    mail.subparts.iter().find_map(|part| find_part(part, mimetype))
}

static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6])>").expect("block pattern is valid")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(style|script)\b.*?</(style|script)>|<[^>]*>").expect("tag pattern is valid")
});

fn html_to_text(html: &str) -> String {
    let text = BLOCK_END.replace_all(html, "\n");
    let text = TAG.replace_all(&text, "");
    text.replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&rsquo;", "’")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
