use jiff::civil::Date;
use log::trace;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("value {value:?} for {key} cannot be sent as an IMAP search value")]
    InvalidQueryValue { key: String, value: String },
    #[error("value {value:?} for {key} is not a date (expected YYYY-MM-DD or DD-Mon-YYYY)")]
    InvalidDateFormat { key: String, value: String },
}

/// Filter criteria for `UID SEARCH`. All present criteria must match.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchCriteria {
    sent_from: Option<String>,
    sent_to: Option<String>,
    subject: Option<String>,
    date_from: Option<Date>,
    date_to: Option<Date>,
    date: Option<Date>,
    unread: Option<bool>,
    flagged: Option<bool>,
    draft: Option<bool>,
    text: Option<String>,
    body: Option<String>,
    uid_range: Option<String>,
    raw: Option<String>,
    folder: Option<String>,
}

impl SearchCriteria {
    #[must_use]
    pub fn sent_from(mut self, address: impl Into<String>) -> Self {
        self.sent_from = Some(address.into());
        self
    }

    #[must_use]
    pub fn sent_to(mut self, address: impl Into<String>) -> Self {
        self.sent_to = Some(address.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Messages sent on or after `date`.
    #[must_use]
    pub fn date_from(mut self, date: Date) -> Self {
        self.date_from = Some(date);
        self
    }

    /// Messages sent before `date`.
    #[must_use]
    pub fn date_to(mut self, date: Date) -> Self {
        self.date_to = Some(date);
        self
    }

    #[must_use]
    pub fn date(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn unread(mut self, unread: bool) -> Self {
        self.unread = Some(unread);
        self
    }

    #[must_use]
    pub fn flagged(mut self, flagged: bool) -> Self {
        self.flagged = Some(flagged);
        self
    }

    #[must_use]
    pub fn draft(mut self, draft: bool) -> Self {
        self.draft = Some(draft);
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// A UID sequence set such as `100:*` or `3,5:9`.
    #[must_use]
    pub fn uid_range(mut self, range: impl Into<String>) -> Self {
        self.uid_range = Some(range.into());
        self
    }

    /// Appended to the query verbatim.
    #[must_use]
    pub fn raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Folder to select before searching. Not part of the query string.
    #[must_use]
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn selected_folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    /// Builds criteria from `key=value` style pairs. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::InvalidDateFormat`] for unparseable dates and
    /// [`QueryError::InvalidQueryValue`] for unparseable booleans.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut criteria = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "sent_from" => criteria.sent_from = Some(value.to_string()),
                "sent_to" => criteria.sent_to = Some(value.to_string()),
                "subject" => criteria.subject = Some(value.to_string()),
                "date_from" => criteria.date_from = Some(parse_date(key, value)?),
                "date_to" => criteria.date_to = Some(parse_date(key, value)?),
                "date" => criteria.date = Some(parse_date(key, value)?),
                "unread" => criteria.unread = Some(parse_bool(key, value)?),
                "flagged" => criteria.flagged = Some(parse_bool(key, value)?),
                "draft" => criteria.draft = Some(parse_bool(key, value)?),
                "text" => criteria.text = Some(value.to_string()),
                "body" => criteria.body = Some(value.to_string()),
                "uid_range" => criteria.uid_range = Some(value.to_string()),
                "raw" => criteria.raw = Some(value.to_string()),
                "folder" => criteria.folder = Some(value.to_string()),
                _ => trace!("ignoring unknown search criterion {key}"),
            }
        }

        Ok(criteria)
    }

    /// Renders the criteria as an IMAP search key list, `ALL` if empty.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::InvalidQueryValue`] if a value cannot be
    /// represented as a quoted string.
    pub fn build(&self) -> Result<String, QueryError> {
        let mut atoms: Vec<String> = Vec::new();

        let quoted_atoms = [
            ("sent_from", "FROM", &self.sent_from),
            ("sent_to", "TO", &self.sent_to),
            ("subject", "SUBJECT", &self.subject),
        ];
        for (key, atom, value) in quoted_atoms {
            if let Some(value) = value {
                atoms.push(format!("{atom} {}", quote_value(key, value)?));
            }
        }

        let date_atoms = [
            ("SINCE", self.date_from),
            ("BEFORE", self.date_to),
            ("ON", self.date),
        ];
        for (atom, date) in date_atoms {
            if let Some(date) = date {
                atoms.push(format!("{atom} {}", imap_date(date)));
            }
        }

        let bool_atoms = [
            (self.unread, "UNSEEN", "SEEN"),
            (self.flagged, "FLAGGED", "UNFLAGGED"),
            (self.draft, "DRAFT", "UNDRAFT"),
        ];
        for (value, when_set, when_unset) in bool_atoms {
            match value {
                Some(true) => atoms.push(when_set.to_string()),
                Some(false) => atoms.push(when_unset.to_string()),
                None => {}
            }
        }

        if let Some(text) = &self.text {
            atoms.push(format!("TEXT {}", quote_value("text", text)?));
        }
        if let Some(body) = &self.body {
            atoms.push(format!("BODY {}", quote_value("body", body)?));
        }
        if let Some(range) = &self.uid_range {
            if range.is_empty()
                || !range
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, ':' | ',' | '*'))
            {
                return Err(QueryError::InvalidQueryValue {
                    key: "uid_range".to_string(),
                    value: range.clone(),
                });
            }
            atoms.push(format!("UID {range}"));
        }
        if let Some(raw) = &self.raw {
            if raw.contains(['\r', '\n', '\0']) {
                return Err(QueryError::InvalidQueryValue {
                    key: "raw".to_string(),
                    value: raw.clone(),
                });
            }
            atoms.push(raw.clone());
        }

        if atoms.is_empty() {
            Ok("ALL".to_string())
        } else {
            Ok(atoms.join(" "))
        }
    }
}

/// Wraps `value` in double quotes, escaping `\` and `"`. Returns `None` for
/// values a quoted string cannot carry: CR, LF, NUL and anything outside 7-bit ASCII.
pub(crate) fn quote(value: &str) -> Option<String> {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\r' | '\n' | '\0' => return None,
            c if !c.is_ascii() => return None,
            c => quoted.push(c),
        }
    }
    quoted.push('"');

    Some(quoted)
}

fn quote_value(key: &str, value: &str) -> Result<String, QueryError> {
    quote(value).ok_or_else(|| QueryError::InvalidQueryValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn imap_date(date: Date) -> String {
    date.strftime("%d-%b-%Y").to_string()
}

fn parse_date(key: &str, value: &str) -> Result<Date, QueryError> {
    value
        .parse::<Date>()
        .or_else(|_| Date::strptime("%d-%b-%Y", value))
        .map_err(|_| QueryError::InvalidDateFormat {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, QueryError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(QueryError::InvalidQueryValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use jiff::civil::date;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_empty_criteria_searches_all() {
        assert_eq!("ALL", assert_ok!(SearchCriteria::default().build()));
    }

    #[rstest]
    fn test_unread_adds_unseen() {
        let query = assert_ok!(SearchCriteria::default().unread(true).build());
        assert_contains!(query, "UNSEEN");
    }

    #[rstest]
    fn test_sent_from_is_quoted() {
        let query = assert_ok!(SearchCriteria::default().sent_from("a@b.com").build());
        assert_eq!(r#"FROM "a@b.com""#, query);
    }

    #[rstest]
    fn test_atoms_are_joined_with_spaces() {
        let criteria = SearchCriteria::default()
            .sent_from("alice@example.org")
            .sent_to("bob@example.org")
            .subject("Quarterly report")
            .date_from(date(2024, 1, 5))
            .date_to(date(2024, 2, 10))
            .flagged(true)
            .draft(false);

        assert_eq!(
            r#"FROM "alice@example.org" TO "bob@example.org" SUBJECT "Quarterly report" SINCE 05-Jan-2024 BEFORE 10-Feb-2024 FLAGGED UNDRAFT"#,
            assert_ok!(criteria.build())
        );
    }

    #[rstest]
    fn test_single_date_uses_on() {
        let query = assert_ok!(SearchCriteria::default().date(date(2023, 12, 24)).build());
        assert_eq!("ON 24-Dec-2023", query);
    }

    #[rstest]
    fn test_read_messages_search_seen() {
        let query = assert_ok!(SearchCriteria::default().unread(false).build());
        assert_eq!("SEEN", query);
    }

    #[rstest]
    fn test_quotes_and_backslashes_are_escaped() {
        let query = assert_ok!(SearchCriteria::default().subject(r#"say "hi" \o/"#).build());
        assert_eq!(r#"SUBJECT "say \"hi\" \\o/""#, query);
    }

    #[rstest]
    #[case("line\r\nbreak")]
    #[case("nul\0byte")]
    #[case("Grüße")]
    fn test_unquotable_values_are_rejected(#[case] value: &str) {
        let error = assert_err!(SearchCriteria::default().text(value).build());
        assert_eq!(
            QueryError::InvalidQueryValue {
                key: "text".to_string(),
                value: value.to_string(),
            },
            error
        );
    }

    #[rstest]
    fn test_folder_is_not_part_of_query() {
        let criteria = SearchCriteria::default().folder("Archive");
        assert_eq!("ALL", assert_ok!(criteria.build()));
        assert_eq!(Some("Archive"), criteria.selected_folder());
    }

    #[rstest]
    fn test_uid_range_and_raw_passthrough() {
        let criteria = SearchCriteria::default()
            .uid_range("100:*")
            .raw("LARGER 1000");
        assert_eq!("UID 100:* LARGER 1000", assert_ok!(criteria.build()));
    }

    #[rstest]
    #[case("1:2 OR")]
    #[case("")]
    fn test_invalid_uid_range_is_rejected(#[case] range: &str) {
        assert_err!(SearchCriteria::default().uid_range(range).build());
    }

    #[rstest]
    fn test_raw_with_line_break_is_rejected() {
        assert_err!(SearchCriteria::default().raw("ALL\r\nA1 LOGOUT").build());
    }

    #[rstest]
    fn test_from_pairs_ignores_unknown_keys() {
        let criteria = assert_ok!(SearchCriteria::from_pairs([
            ("sent_to", "bob@example.org"),
            ("colour", "blue"),
            ("unread", "yes"),
        ]));
        assert_eq!(
            r#"TO "bob@example.org" UNSEEN"#,
            assert_ok!(criteria.build())
        );
    }

    #[rstest]
    #[case("2024-03-01")]
    #[case("01-Mar-2024")]
    fn test_from_pairs_accepts_both_date_styles(#[case] value: &str) {
        let criteria = assert_ok!(SearchCriteria::from_pairs([("date_from", value)]));
        assert_eq!("SINCE 01-Mar-2024", assert_ok!(criteria.build()));
    }

    #[rstest]
    #[case("yesterday")]
    #[case("2024-13-01")]
    #[case("31-Feb-2024")]
    fn test_from_pairs_rejects_bad_dates(#[case] value: &str) {
        let error = assert_err!(SearchCriteria::from_pairs([("date", value)]));
        assert_matches!(error, QueryError::InvalidDateFormat { .. });
    }

    #[rstest]
    fn test_from_pairs_rejects_bad_booleans() {
        let error = assert_err!(SearchCriteria::from_pairs([("flagged", "maybe")]));
        assert_matches!(error, QueryError::InvalidQueryValue { .. });
    }
}
