use crate::parser::pattern::Pattern;
use crate::parser::traits::UserAgentParser;

use super::model::{DeviceType, UserAgentInfo};
use super::rules::{
    DeviceRuleSpec, RuleSpec, BOT_MARKER, BOT_RULES, BROWSER_RULES, CHROME_OVERRIDES, DEVICE_RULES,
    GENERIC_BOT, OS_RULES,
};

#[derive(Debug)]
struct Rule {
    name: &'static str,
    matcher: Pattern,
    version: Option<Pattern>,
}

impl Rule {
    fn compile(spec: &RuleSpec) -> Option<Self> {
        let matcher = compile_logged(spec.pattern)?;
        let version = match spec.version {
            Some(v) => Some(compile_logged(v)?),
            None => None,
        };
        Some(Self {
            name: spec.name,
            matcher,
            version,
        })
    }

    fn version_of(&self, ua: &str) -> String {
        self.version
            .as_ref()
            .and_then(|v| v.capture(ua, 1))
            .map(clean_version)
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct DeviceRule {
    device: DeviceType,
    matcher: Pattern,
}

fn compile_logged(source: &str) -> Option<Pattern> {
    match Pattern::new(source) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::error!(error = %e, "skipping user-agent rule");
            None
        }
    }
}

fn compile_rules(specs: &[RuleSpec]) -> Vec<Rule> {
    specs.iter().filter_map(Rule::compile).collect()
}

fn compile_devices(specs: &[DeviceRuleSpec]) -> Vec<DeviceRule> {
    specs
        .iter()
        .filter_map(|spec| {
            compile_logged(spec.pattern).map(|matcher| DeviceRule {
                device: spec.device,
                matcher,
            })
        })
        .collect()
}

/// `_` to `.`, then drop trailing `.0` groups: `10_15_0` becomes `10.15`.
pub fn clean_version(raw: &str) -> String {
    let mut version = raw.trim_matches('.').replace('_', ".");
    while let Some(stripped) = version.strip_suffix(".0") {
        let len = stripped.len();
        version.truncate(len);
    }
    version
}

/// Heuristic classifier driven by the ordered tables in
/// [`rules`](super::rules).
///
/// Rules that fail to compile are logged and skipped; the rest still apply.
#[derive(Debug)]
pub struct UserAgentClassifier {
    bots: Vec<Rule>,
    bot_marker: Option<Pattern>,
    browsers: Vec<Rule>,
    oses: Vec<Rule>,
    devices: Vec<DeviceRule>,
}

impl UserAgentClassifier {
    pub fn new() -> Self {
        Self {
            bots: compile_rules(BOT_RULES),
            bot_marker: compile_logged(BOT_MARKER),
            browsers: compile_rules(BROWSER_RULES),
            oses: compile_rules(OS_RULES),
            devices: compile_devices(DEVICE_RULES),
        }
    }

    /// Compiled rule counts: bots, browsers, operating systems, devices.
    pub fn rule_counts(&self) -> (usize, usize, usize, usize) {
        (self.bots.len(), self.browsers.len(), self.oses.len(), self.devices.len())
    }

    pub fn classify(&self, ua: &str) -> UserAgentInfo {
        let ua = ua.trim();
        if ua.is_empty() || ua == "-" {
            return UserAgentInfo::unknown();
        }

        let mut info = UserAgentInfo::unknown();

        let bot = self.match_bot(ua);
        let is_bot = bot.is_some();
        match bot {
            Some((name, version)) => {
                info.browser = name.to_string();
                info.browser_version = version;
            }
            None => {
                if let Some(rule) = first_match(&self.browsers, ua) {
                    info.browser = rule.name.to_string();
                    info.browser_version = rule.version_of(ua);
                }
            }
        }

        if let Some(rule) = first_match(&self.oses, ua) {
            info.os = rule.name.to_string();
            info.os_version = rule.version_of(ua);
        }

        info.device_type = if is_bot { DeviceType::Bot } else { self.match_device(ua) };

        promote_tablet(&mut info, ua);
        self.refine_chrome(&mut info, ua);
        info
    }

    fn match_bot(&self, ua: &str) -> Option<(&'static str, String)> {
        if let Some(rule) = first_match(&self.bots, ua) {
            return Some((rule.name, rule.version_of(ua)));
        }
        self.bot_marker
            .as_ref()
            .filter(|m| m.is_match(ua))
            .map(|_| (GENERIC_BOT, String::new()))
    }

    fn match_device(&self, ua: &str) -> DeviceType {
        self.devices
            .iter()
            .find(|rule| rule.matcher.is_match(ua))
            .map_or(DeviceType::Desktop, |rule| rule.device)
    }

    /// A `Chrome` result carrying another Chromium browser's token is
    /// renamed to that browser.
    fn refine_chrome(&self, info: &mut UserAgentInfo, ua: &str) {
        if info.browser != "Chrome" {
            return;
        }
        let found = self
            .browsers
            .iter()
            .filter(|rule| CHROME_OVERRIDES.contains(&rule.name))
            .find(|rule| rule.matcher.is_match(ua));
        if let Some(rule) = found {
            info.browser = rule.name.to_string();
            info.browser_version = rule.version_of(ua);
        }
    }
}

impl Default for UserAgentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentParser for UserAgentClassifier {
    fn parse(&self, user_agent: &str) -> UserAgentInfo {
        self.classify(user_agent)
    }
}

fn first_match<'r>(rules: &'r [Rule], ua: &str) -> Option<&'r Rule> {
    rules.iter().find(|rule| rule.matcher.is_match(ua))
}

/// Android without `mobile`, or anything saying `ipad`/`tablet`, is a
/// tablet unless a more specific device already matched.
fn promote_tablet(info: &mut UserAgentInfo, ua: &str) {
    if !matches!(info.device_type, DeviceType::Mobile | DeviceType::Desktop) {
        return;
    }
    let lower = ua.to_ascii_lowercase();
    let android_tablet = lower.contains("android") && !lower.contains("mobile");
    if android_tablet || lower.contains("ipad") || lower.contains("tablet") {
        info.device_type = DeviceType::Tablet;
    }
}
