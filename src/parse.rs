//! The rule-text parser seam and the built-in section parser.
//!
//! The exact grammar is a collaborator concern; the mutation protocol
//! only needs a [`RuleParser`] that turns raw text into a [`RuleSet`]
//! whose entities carry locators. [`SectionParser`] is the built-in
//! implementation of a brace-delimited section grammar.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::alert::{Alert, Macro, MacroPair, Template};
use crate::error::{ParseError, RuleResult};
use crate::lookup::{Lookup, LookupEntry};
use crate::notification::{Notification, NotificationRegistry, NotificationRules};
use crate::tags::{parse_bool, parse_duration, parse_tags};

/// Where an entity sits in the raw rule text.
///
/// A closed set of location kinds; today only native line ranges exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// A 1-based, inclusive line range in the raw text.
    Native {
        /// First line of the section header.
        start_line: usize,
        /// Line holding the closing brace.
        end_line: usize,
    },
}

impl Locator {
    /// The 1-based, inclusive line range this locator covers.
    #[must_use]
    pub const fn line_range(&self) -> (usize, usize) {
        match self {
            Self::Native {
                start_line,
                end_line,
            } => (*start_line, *end_line),
        }
    }
}

/// The kinds of named entities the rule text can define.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Alert,
    Notification,
    Template,
    Lookup,
    Macro,
}

impl EntityKind {
    /// The keyword used in section headers and edit requests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Notification => "notification",
            Self::Template => "template",
            Self::Lookup => "lookup",
            Self::Macro => "macro",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alert" => Ok(Self::Alert),
            "notification" => Ok(Self::Notification),
            "template" => Ok(Self::Template),
            "lookup" => Ok(Self::Lookup),
            "macro" => Ok(Self::Macro),
            _ => Err(()),
        }
    }
}

/// An immutable snapshot of every entity derived from one rule text.
///
/// Invariant: a `RuleSet` is reproducible purely by reparsing the text
/// it came from; no side-channel state survives a rebuild.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Alerts by name.
    pub alerts: BTreeMap<String, Alert>,
    /// The notification registry, by name.
    pub notifications: NotificationRegistry,
    /// Lookup tables by name.
    pub lookups: BTreeMap<String, Lookup>,
    /// Templates by name.
    pub templates: BTreeMap<String, Template>,
    /// Macros by name.
    pub macros: BTreeMap<String, Macro>,
}

impl RuleSet {
    /// Returns the locator for the named entity, if it exists.
    #[must_use]
    pub fn locate(&self, kind: EntityKind, name: &str) -> Option<Locator> {
        match kind {
            EntityKind::Alert => self.alerts.get(name).and_then(|a| a.locator),
            EntityKind::Notification => self.notifications.get(name).and_then(|n| n.locator),
            EntityKind::Template => self.templates.get(name).and_then(|t| t.locator),
            EntityKind::Lookup => self.lookups.get(name).and_then(|l| l.locator),
            EntityKind::Macro => self.macros.get(name).and_then(|m| m.locator),
        }
    }

    /// Looks up a notification by name.
    #[must_use]
    pub fn get_notification(&self, name: &str) -> Option<&Arc<Notification>> {
        self.notifications.get(name)
    }
}

/// Turns raw rule text into a [`RuleSet`].
pub trait RuleParser: Send + Sync {
    /// Parses and cross-validates `text`.
    fn parse(&self, text: &str) -> RuleResult<RuleSet>;
}

/// The built-in brace-delimited section grammar:
///
/// ```text
/// notification page-oncall {
///     post = https://pager.example.com/trigger
///     next = email-team
///     timeout = 10m
/// }
///
/// lookup routing {
///     entry host=web-.* {
///         routing = page-oncall
///     }
/// }
///
/// alert high.cpu {
///     crit = avg(q("sum:cpu{host=*}", "5m")) > 90
///     squelch = host=build-.*,tier=ci
///     critNotification = page-oncall
///     critNotification = lookup(routing)
/// }
/// ```
///
/// `#` comments and blank lines are allowed between sections and body
/// lines. Statically referenced notifications, templates, lookup
/// tables, and `next` targets must be defined in the same text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionParser;

impl RuleParser for SectionParser {
    fn parse(&self, text: &str) -> RuleResult<RuleSet> {
        parse_rules(text)
    }
}

struct Section<'a> {
    kind: EntityKind,
    name: String,
    /// 1-based line of the header.
    start: usize,
    /// 1-based line of the closing brace.
    end: usize,
    /// Body lines with their 1-based line numbers.
    body: Vec<(usize, &'a str)>,
    text: String,
}

impl Section<'_> {
    fn locator(&self) -> Locator {
        Locator::Native {
            start_line: self.start,
            end_line: self.end,
        }
    }
}

fn split_sections(text: &str) -> Result<Vec<Section<'_>>, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() || line.starts_with('#') {
            i += 1;
            continue;
        }
        let Some(head) = line.strip_suffix('{') else {
            return Err(ParseError::MalformedSectionHeader {
                line: i + 1,
                text: line.to_string(),
            });
        };
        let mut words = head.split_whitespace();
        let (Some(kind_word), Some(name), None) = (words.next(), words.next(), words.next())
        else {
            return Err(ParseError::MalformedSectionHeader {
                line: i + 1,
                text: line.to_string(),
            });
        };
        let kind = EntityKind::from_str(kind_word).map_err(|()| ParseError::UnknownSectionKind {
            line: i + 1,
            kind: kind_word.to_string(),
        })?;

        let mut depth = 1usize;
        let mut j = i + 1;
        while j < lines.len() {
            let t = lines[j].trim();
            if t == "}" {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            } else if t.ends_with('{') && !t.starts_with('#') {
                depth += 1;
            }
            j += 1;
        }
        if depth != 0 {
            return Err(ParseError::UnterminatedSection {
                name: name.to_string(),
                line: i + 1,
            });
        }

        sections.push(Section {
            kind,
            name: name.to_string(),
            start: i + 1,
            end: j + 1,
            body: (i + 1..j).map(|k| (k + 1, lines[k])).collect(),
            text: lines[i..=j].join("\n"),
        });
        i = j + 1;
    }
    Ok(sections)
}

fn split_body_line<'a>(
    line_no: usize,
    line: &'a str,
) -> Result<Option<(&'a str, &'a str)>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let Some((key, value)) = trimmed.split_once('=') else {
        return Err(ParseError::MalformedBodyLine {
            line: line_no,
            text: trimmed.to_string(),
        });
    };
    Ok(Some((key.trim(), value.trim())))
}

/// A statically referenced notification name, or an override table.
enum NotifRef {
    Name(String),
    Lookup(String),
}

fn parse_notif_refs(value: &str, out: &mut Vec<NotifRef>) {
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(inner) = token
            .strip_prefix("lookup(")
            .and_then(|t| t.strip_suffix(')'))
        {
            out.push(NotifRef::Lookup(inner.trim().to_string()));
        } else {
            out.push(NotifRef::Name(token.to_string()));
        }
    }
}

struct PendingAlert {
    alert: Alert,
    crit_refs: Vec<NotifRef>,
    warn_refs: Vec<NotifRef>,
}

fn parse_notification(section: &Section<'_>) -> RuleResult<Notification> {
    let mut n = Notification {
        name: section.name.clone(),
        text: section.text.clone(),
        locator: Some(section.locator()),
        ..Notification::default()
    };
    for &(line_no, line) in &section.body {
        let Some((key, value)) = split_body_line(line_no, line)? else {
            continue;
        };
        match key {
            "email" => {
                n.email = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "post" => n.post = Some(value.to_string()),
            "get" => n.get = Some(value.to_string()),
            "print" => n.print = parse_bool(value)?,
            "next" => n.next = Some(value.to_string()),
            "timeout" => n.timeout = Some(parse_duration(value)?),
            "contentType" => n.content_type = Some(value.to_string()),
            _ => {
                return Err(ParseError::UnknownKey {
                    line: line_no,
                    key: key.to_string(),
                    kind: "notification".to_string(),
                    name: section.name.clone(),
                }
                .into())
            }
        }
    }
    if !n.has_action() {
        return Err(ParseError::NoAction {
            name: section.name.clone(),
        }
        .into());
    }
    Ok(n)
}

fn parse_lookup(section: &Section<'_>) -> RuleResult<Lookup> {
    let mut entries = Vec::new();
    let mut tag_keys: Option<Vec<String>> = None;
    let mut idx = 0;
    while idx < section.body.len() {
        let (line_no, raw) = section.body[idx];
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            idx += 1;
            continue;
        }
        let def = line
            .strip_prefix("entry ")
            .and_then(|rest| rest.strip_suffix('{'))
            .map(str::trim)
            .ok_or_else(|| ParseError::MalformedBodyLine {
                line: line_no,
                text: line.to_string(),
            })?;
        let guard = parse_tags(def)?;
        let keys: Vec<String> = guard.keys().cloned().collect();
        match &tag_keys {
            None => tag_keys = Some(keys),
            Some(expected) if *expected == keys => {}
            Some(expected) => {
                return Err(ParseError::MismatchedEntryKeys {
                    name: section.name.clone(),
                    index: entries.len(),
                    got: keys,
                    expected: expected.clone(),
                }
                .into())
            }
        }

        // Payload lines until the entry's closing brace.
        let mut values = guard;
        let mut end = None;
        for k in idx + 1..section.body.len() {
            let (inner_no, inner_raw) = section.body[k];
            if inner_raw.trim() == "}" {
                end = Some(k);
                break;
            }
            if let Some((key, value)) = split_body_line(inner_no, inner_raw)? {
                values.insert(key.to_string(), value.to_string());
            }
        }
        let Some(end) = end else {
            return Err(ParseError::UnterminatedSection {
                name: format!("{} entry", section.name),
                line: line_no,
            }
            .into());
        };
        entries.push(LookupEntry {
            def: def.to_string(),
            values,
        });
        idx = end + 1;
    }
    Ok(Lookup {
        name: section.name.clone(),
        tags: tag_keys.unwrap_or_default(),
        entries,
        locator: Some(section.locator()),
    })
}

fn parse_template(section: &Section<'_>) -> RuleResult<Template> {
    let mut t = Template {
        name: section.name.clone(),
        text: section.text.clone(),
        locator: Some(section.locator()),
        ..Template::default()
    };
    for &(line_no, line) in &section.body {
        let Some((key, value)) = split_body_line(line_no, line)? else {
            continue;
        };
        match key {
            "body" => t.body = Some(value.to_string()),
            "subject" => t.subject = Some(value.to_string()),
            _ => {
                return Err(ParseError::UnknownKey {
                    line: line_no,
                    key: key.to_string(),
                    kind: "template".to_string(),
                    name: section.name.clone(),
                }
                .into())
            }
        }
    }
    Ok(t)
}

fn parse_macro(section: &Section<'_>) -> RuleResult<Macro> {
    let mut pairs = Vec::new();
    for &(line_no, line) in &section.body {
        if let Some((key, value)) = split_body_line(line_no, line)? {
            pairs.push(MacroPair {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(Macro {
        name: section.name.clone(),
        text: section.text.clone(),
        pairs,
        locator: Some(section.locator()),
    })
}

fn parse_alert(section: &Section<'_>) -> RuleResult<PendingAlert> {
    let mut alert = Alert {
        name: section.name.clone(),
        text: section.text.clone(),
        locator: Some(section.locator()),
        ..Alert::default()
    };
    let mut crit_refs = Vec::new();
    let mut warn_refs = Vec::new();
    for &(line_no, line) in &section.body {
        let Some((key, value)) = split_body_line(line_no, line)? else {
            continue;
        };
        match key {
            "template" => alert.template = Some(value.to_string()),
            "crit" => alert.crit = Some(value.to_string()),
            "warn" => alert.warn = Some(value.to_string()),
            "squelch" => {
                alert.squelch.add(value)?;
                alert.raw_squelch.push(value.to_string());
            }
            "critNotification" => parse_notif_refs(value, &mut crit_refs),
            "warnNotification" => parse_notif_refs(value, &mut warn_refs),
            "unknown" => alert.unknown = Some(parse_duration(value)?),
            "maxLogFrequency" => alert.max_log_frequency = Some(parse_duration(value)?),
            "ignoreUnknown" => alert.ignore_unknown = parse_bool(value)?,
            "unknownsNormal" => alert.unknowns_normal = parse_bool(value)?,
            "log" => alert.log = parse_bool(value)?,
            "runEvery" => {
                alert.run_every =
                    Some(value.parse().map_err(|_| ParseError::InvalidInteger {
                        value: value.to_string(),
                    })?);
            }
            _ => {
                return Err(ParseError::UnknownKey {
                    line: line_no,
                    key: key.to_string(),
                    kind: "alert".to_string(),
                    name: section.name.clone(),
                }
                .into())
            }
        }
    }
    Ok(PendingAlert {
        alert,
        crit_refs,
        warn_refs,
    })
}

fn resolve_rules(
    refs: Vec<NotifRef>,
    alert_name: &str,
    registry: &NotificationRegistry,
    lookups: &BTreeMap<String, Lookup>,
) -> RuleResult<NotificationRules> {
    let mut rules = NotificationRules::default();
    for r in refs {
        match r {
            NotifRef::Name(name) => {
                let n = registry
                    .get(&name)
                    .ok_or_else(|| ParseError::UnknownReference {
                        kind: "alert".to_string(),
                        name: alert_name.to_string(),
                        target_kind: "notification".to_string(),
                        target: name.clone(),
                    })?;
                rules.notifications.insert(name, Arc::clone(n));
            }
            NotifRef::Lookup(table) => {
                let l = lookups
                    .get(&table)
                    .ok_or_else(|| ParseError::UnknownReference {
                        kind: "alert".to_string(),
                        name: alert_name.to_string(),
                        target_kind: "lookup".to_string(),
                        target: table.clone(),
                    })?;
                rules.lookups.insert(table, l.clone());
            }
        }
    }
    Ok(rules)
}

fn parse_rules(text: &str) -> RuleResult<RuleSet> {
    let sections = split_sections(text)?;

    let mut notifications = NotificationRegistry::new();
    let mut lookups: BTreeMap<String, Lookup> = BTreeMap::new();
    let mut templates: BTreeMap<String, Template> = BTreeMap::new();
    let mut macros: BTreeMap<String, Macro> = BTreeMap::new();
    let mut pending: Vec<PendingAlert> = Vec::new();

    for section in &sections {
        let duplicate = match section.kind {
            EntityKind::Alert => pending.iter().any(|p| p.alert.name == section.name),
            EntityKind::Notification => notifications.contains_key(&section.name),
            EntityKind::Lookup => lookups.contains_key(&section.name),
            EntityKind::Template => templates.contains_key(&section.name),
            EntityKind::Macro => macros.contains_key(&section.name),
        };
        if duplicate {
            return Err(ParseError::DuplicateDefinition {
                kind: section.kind.to_string(),
                name: section.name.clone(),
            }
            .into());
        }
        match section.kind {
            EntityKind::Notification => {
                let n = parse_notification(section)?;
                notifications.insert(section.name.clone(), Arc::new(n));
            }
            EntityKind::Lookup => {
                lookups.insert(section.name.clone(), parse_lookup(section)?);
            }
            EntityKind::Template => {
                templates.insert(section.name.clone(), parse_template(section)?);
            }
            EntityKind::Macro => {
                macros.insert(section.name.clone(), parse_macro(section)?);
            }
            EntityKind::Alert => pending.push(parse_alert(section)?),
        }
    }

    // Cross-reference validation once every definition is known.
    for n in notifications.values() {
        if let Some(next) = &n.next {
            if !notifications.contains_key(next) {
                return Err(ParseError::UnknownReference {
                    kind: "notification".to_string(),
                    name: n.name.clone(),
                    target_kind: "notification".to_string(),
                    target: next.clone(),
                }
                .into());
            }
        }
    }

    let mut alerts = BTreeMap::new();
    for p in pending {
        let mut alert = p.alert;
        if let Some(template) = &alert.template {
            if !templates.contains_key(template) {
                return Err(ParseError::UnknownReference {
                    kind: "alert".to_string(),
                    name: alert.name.clone(),
                    target_kind: "template".to_string(),
                    target: template.clone(),
                }
                .into());
            }
        }
        alert.crit_notification =
            resolve_rules(p.crit_refs, &alert.name, &notifications, &lookups)?;
        alert.warn_notification =
            resolve_rules(p.warn_refs, &alert.name, &notifications, &lookups)?;
        alerts.insert(alert.name.clone(), alert);
    }

    Ok(RuleSet {
        alerts,
        notifications,
        lookups,
        templates,
        macros,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::RuleError;

    const SAMPLE: &str = r#"# routing rules
notification email-team {
    email = team@example.com, lead@example.com
    next = page-oncall
    timeout = 10m
}

notification page-oncall {
    post = https://pager.example.com/trigger
}

lookup routing {
    entry host=web-01 {
        routing = page-oncall
    }
    entry host=db-01 {
        routing = email-team
    }
}

template outage {
    subject = {{.Alert.Name}} is {{.Status}}
    body = see dashboard
}

macro prod-defaults {
    log = true
    runEvery = 2
}

alert high.cpu {
    template = outage
    crit = avg(q("sum:cpu{host=*}", "5m")) > 90
    warn = avg(q("sum:cpu{host=*}", "5m")) > 75
    squelch = host=build-.*
    critNotification = email-team
    critNotification = lookup(routing)
    ignoreUnknown = true
    maxLogFrequency = 5m
    runEvery = 2
}
"#;

    #[test]
    fn parses_all_entity_kinds() {
        let rules = SectionParser.parse(SAMPLE).unwrap();
        assert_eq!(rules.notifications.len(), 2);
        assert_eq!(rules.lookups.len(), 1);
        assert_eq!(rules.templates.len(), 1);
        assert_eq!(rules.macros.len(), 1);
        assert_eq!(rules.alerts.len(), 1);

        let n = &rules.notifications["email-team"];
        assert_eq!(n.email, vec!["team@example.com", "lead@example.com"]);
        assert_eq!(n.next.as_deref(), Some("page-oncall"));
        assert_eq!(n.timeout, Some(chrono::Duration::minutes(10)));

        let a = &rules.alerts["high.cpu"];
        assert_eq!(a.template.as_deref(), Some("outage"));
        assert_eq!(a.squelch.len(), 1);
        assert!(a.ignore_unknown);
        assert_eq!(a.run_every, Some(2));
        assert!(a.crit_notification.notifications.contains_key("email-team"));
        assert!(a.crit_notification.lookups.contains_key("routing"));
        assert!(a.warn_notification.is_empty());

        let m = &rules.macros["prod-defaults"];
        assert_eq!(m.pairs[0].key, "log");
        assert_eq!(m.pairs[1].value, "2");
    }

    #[test]
    fn locators_cover_whole_sections() {
        let rules = SectionParser.parse(SAMPLE).unwrap();
        let (start, end) = rules
            .locate(EntityKind::Notification, "email-team")
            .unwrap()
            .line_range();
        assert_eq!(start, 2);
        assert_eq!(end, 6);

        let lines: Vec<&str> = SAMPLE.lines().collect();
        assert_eq!(lines[start - 1], "notification email-team {");
        assert_eq!(lines[end - 1], "}");
    }

    #[test]
    fn snapshot_is_reproducible_from_text() {
        let a = SectionParser.parse(SAMPLE).unwrap();
        let b = SectionParser.parse(SAMPLE).unwrap();
        assert_eq!(a.alerts["high.cpu"].text, b.alerts["high.cpu"].text);
        assert_eq!(
            a.lookups["routing"].entries,
            b.lookups["routing"].entries
        );
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let text = "notification a {\n    print = true\n}\nnotification a {\n    print = true\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Parse(ParseError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn dangling_next_is_rejected() {
        let text = "notification a {\n    print = true\n    next = gone\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Parse(ParseError::UnknownReference { ref target, .. }) if target == "gone"
        ));
    }

    #[test]
    fn alert_referencing_unknown_notification_is_rejected() {
        let text = "alert a {\n    crit = 1\n    critNotification = nope\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Parse(ParseError::UnknownReference { ref target_kind, .. })
                if target_kind == "notification"
        ));
    }

    #[test]
    fn notification_without_action_is_rejected() {
        let text = "notification idle {\n    timeout = 5m\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(err, RuleError::Parse(ParseError::NoAction { .. })));
    }

    #[test]
    fn unknown_body_key_is_rejected() {
        let text = "notification a {\n    print = true\n    frobnicate = 1\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Parse(ParseError::UnknownKey { ref key, .. }) if key == "frobnicate"
        ));
    }

    #[test]
    fn unterminated_section_is_rejected() {
        let text = "alert a {\n    crit = 1\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Parse(ParseError::UnterminatedSection { .. })
        ));
    }

    #[test]
    fn mismatched_lookup_guard_keys_are_rejected() {
        let text = "lookup l {\n    entry host=a {\n        v = 1\n    }\n    entry tier=prod {\n        v = 2\n    }\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Parse(ParseError::MismatchedEntryKeys { .. })
        ));
    }

    #[test]
    fn bad_squelch_pattern_fails_the_parse() {
        let text = "alert a {\n    crit = 1\n    squelch = host=(unclosed\n}\n";
        let err = SectionParser.parse(text).unwrap_err();
        assert!(matches!(err, RuleError::Regex { .. }));
    }
}
