//! Ordered user-agent rule tables.
//!
//! Order is significant everywhere: the first matching rule wins, so more
//! specific tokens must come before the generic ones they contain (Edge and
//! Opera before Chrome, app webviews before the browser engine they embed,
//! Linux distributions before plain Linux).

use super::model::DeviceType;

/// A named matcher with an optional version extractor (capture group 1).
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    pub name: &'static str,
    pub pattern: &'static str,
    pub version: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceRuleSpec {
    pub device: DeviceType,
    pub pattern: &'static str,
}

const fn rule(name: &'static str, pattern: &'static str, version: Option<&'static str>) -> RuleSpec {
    RuleSpec { name, pattern, version }
}

/// Anything that looks automated. Checked after the named bots.
pub const BOT_MARKER: &str = r"(?i)\bbot\b|\bbot[_\-]|[a-z0-9]bot/|crawl|spider|slurp|scrapy|headless|phantomjs|python-urllib|python-requests|httpclient|okhttp|java/|libwww|wget|curl|go-http|axios|node-fetch|postman|facebookexternalhit|facebot|twitterbot";

/// Browser name used when only [`BOT_MARKER`] matched.
pub const GENERIC_BOT: &str = "Bot";

pub const BOT_RULES: &[RuleSpec] = &[
    rule("Googlebot", r"(?i)googlebot", Some(r"(?i)googlebot/([\d.]+)")),
    rule("Bingbot", r"(?i)bingbot", Some(r"(?i)bingbot/([\d.]+)")),
    rule("Baiduspider", r"(?i)baiduspider", Some(r"(?i)baiduspider(?:-render)?/([\d.]+)")),
    rule("YandexBot", r"(?i)yandexbot", Some(r"(?i)yandexbot/([\d.]+)")),
    rule("DuckDuckBot", r"(?i)duckduckbot", Some(r"(?i)duckduckbot(?:-https)?/([\d.]+)")),
    rule("Sogou Spider", r"(?i)sogou.*spider", Some(r"(?i)spider/([\d.]+)")),
    rule("360Spider", r"(?i)360spider|haosouspider", None),
    rule("Applebot", r"(?i)applebot", Some(r"(?i)applebot/([\d.]+)")),
    rule("Facebook Crawler", r"(?i)facebookexternalhit|facebot", Some(r"(?i)facebookexternalhit/([\d.]+)")),
    rule("Twitterbot", r"(?i)twitterbot", Some(r"(?i)twitterbot/([\d.]+)")),
    rule("curl", r"(?i)\bcurl/", Some(r"(?i)curl/([\d.]+)")),
    rule("Wget", r"(?i)\bwget/", Some(r"(?i)wget/([\d.]+)")),
    rule("Python Requests", r"(?i)python-requests", Some(r"(?i)python-requests/([\d.]+)")),
    rule("Go HTTP Client", r"(?i)go-http-client", Some(r"(?i)go-http-client/([\d.]+)")),
];

/// Browsers, bots excluded. Apps that embed a webview come first, then
/// vendor builds of Chromium, then the majors.
pub const BROWSER_RULES: &[RuleSpec] = &[
    // in-app webviews
    rule("WeCom", r"(?i)wxwork/", Some(r"(?i)wxwork/([\d.]+)")),
    rule("WeChat", r"MicroMessenger", Some(r"MicroMessenger/([\d.]+)")),
    rule("QQ", r"\bQQ/", Some(r"\bQQ/([\d.]+)")),
    rule("Alipay", r"AlipayClient", Some(r"AlipayClient/([\d.]+)")),
    rule("DingTalk", r"(?i)dingtalk", Some(r"(?i)dingtalk/([\d.]+)")),
    rule("Weibo", r"(?i)weibo", Some(r"(?i)weibo__([\d.]+)")),
    rule("Taobao", r"AliApp\(TB", Some(r"AliApp\(TB/([\d.]+)")),
    rule("JD", r"(?i)jdapp", Some(r"(?i)jdapp;[^;]*;([\d.]+)")),
    rule("Douyin", r"(?i)aweme|douyin", Some(r"(?i)app_version/([\d.]+)")),
    rule("Lark", r"(?i)\blark/|feishu", Some(r"(?i)(?:lark|feishu)/([\d.]+)")),
    rule("Facebook", r"FBAN|FBAV", Some(r"FBAV/([\d.]+)")),
    rule("Instagram", r"Instagram", Some(r"Instagram ([\d.]+)")),
    rule("LINE", r"\bLine/", Some(r"\bLine/([\d.]+)")),
    // vendor builds
    rule("QQ Browser", r"(?i)qqbrowser", Some(r"(?i)qqbrowser/([\d.]+)")),
    rule("UC Browser", r"(?i)ucbrowser|ucweb", Some(r"(?i)ucbrowser/([\d.]+)")),
    rule(
        "Baidu Browser",
        r"(?i)baiduboxapp|bidubrowser|baidubrowser",
        Some(r"(?i)(?:baiduboxapp|bidubrowser|baidubrowser)/([\d.]+)"),
    ),
    rule("Sogou Browser", r"SE \d+\.X MetaSr|SogouMobileBrowser", Some(r"SogouMobileBrowser/([\d.]+)")),
    rule("360 Browser", r"QihooBrowser|QHBrowser|360SE|360EE", Some(r"(?:QihooBrowser|QHBrowser)/([\d.]+)")),
    rule("Quark", r"Quark/", Some(r"Quark/([\d.]+)")),
    rule("Huawei Browser", r"HuaweiBrowser", Some(r"HuaweiBrowser/([\d.]+)")),
    rule("MIUI Browser", r"MiuiBrowser", Some(r"MiuiBrowser/([\d.]+)")),
    rule("Vivo Browser", r"VivoBrowser", Some(r"VivoBrowser/([\d.]+)")),
    rule("HeyTap Browser", r"HeyTapBrowser", Some(r"HeyTapBrowser/([\d.]+)")),
    rule("Samsung Browser", r"SamsungBrowser", Some(r"SamsungBrowser/([\d.]+)")),
    rule("Yandex Browser", r"YaBrowser", Some(r"YaBrowser/([\d.]+)")),
    rule("Maxthon", r"(?i)maxthon", Some(r"(?i)maxthon[/ ]([\d.]+)")),
    rule("Vivaldi", r"Vivaldi", Some(r"Vivaldi/([\d.]+)")),
    rule("Brave", r"Brave", Some(r"Brave/([\d.]+)")),
    // majors
    rule("Edge", r"Edg(?:e|A|iOS)?/", Some(r"Edg(?:e|A|iOS)?/([\d.]+)")),
    rule("Opera", r"OPR/|Opera|OPiOS/|OPT/", Some(r"(?:OPR|OPiOS|OPT|Opera)[/ ]([\d.]+)")),
    rule("Chromium", r"Chromium/", Some(r"Chromium/([\d.]+)")),
    rule("Chrome", r"Chrome/|CriOS/", Some(r"(?:Chrome|CriOS)/([\d.]+)")),
    rule("Firefox", r"Firefox/|FxiOS/", Some(r"(?:Firefox|FxiOS)/([\d.]+)")),
    rule("Safari", r"Safari/", Some(r"Version/([\d.]+)")),
    rule("Internet Explorer", r"MSIE |Trident/", Some(r"(?:MSIE |rv:)([\d.]+)")),
];

/// Tokens that turn a `Chrome` match into another Chromium browser.
pub const CHROME_OVERRIDES: &[&str] = &["Edge", "Opera", "Samsung Browser"];

pub const OS_RULES: &[RuleSpec] = &[
    // mobile
    rule("Windows Phone", r"Windows Phone", Some(r"Windows Phone(?: OS)? ([\d.]+)")),
    rule("HarmonyOS", r"HarmonyOS|OpenHarmony", Some(r"HarmonyOS[ /]?([\d.]+)")),
    rule("iOS", r"iPhone|iPad|iPod", Some(r"OS (\d+[_\d]*)")),
    rule("Android", r"Android", Some(r"Android[ /]?([\d.]+)")),
    rule("BlackBerry", r"BlackBerry|BB10|RIM Tablet OS", Some(r"BlackBerry\w*/([\d.]+)")),
    rule("KaiOS", r"(?i)kaios", Some(r"(?i)kaios/([\d.]+)")),
    rule("Tizen", r"Tizen", Some(r"Tizen[ /]([\d.]+)")),
    rule("Symbian", r"SymbianOS|Symbian/|SymbOS|Series ?60", Some(r"SymbianOS/([\d.]+)")),
    // desktop
    rule("Windows", r"Windows", Some(r"Windows NT ([\d.]+)")),
    rule("macOS", r"Mac OS X|Macintosh", Some(r"Mac OS X (\d+[_.\d]*)")),
    rule("Chrome OS", r"CrOS", Some(r"CrOS \S+ ([\d.]+)")),
    // distributions, before generic Linux
    rule("Linux Mint", r"(?i)linux mint", None),
    rule("Ubuntu", r"(?i)ubuntu", Some(r"(?i)ubuntu/([\d.]+)")),
    rule("Debian", r"(?i)debian", None),
    rule("Fedora", r"(?i)fedora", Some(r"(?i)fedora/([\d.]+)")),
    rule("CentOS", r"(?i)centos", None),
    rule("Red Hat", r"(?i)red hat|\brhel", None),
    rule("openSUSE", r"(?i)opensuse|\bsuse\b", None),
    rule("Arch Linux", r"(?i)arch linux", None),
    rule("Manjaro", r"(?i)manjaro", None),
    rule("Gentoo", r"(?i)gentoo", None),
    rule("Kali", r"(?i)kali", None),
    rule("Alpine", r"(?i)alpine", None),
    rule("Deepin", r"(?i)deepin", None),
    rule("Linux", r"(?i)linux|X11", None),
    // legacy and other
    rule("FreeBSD", r"FreeBSD", None),
    rule("OpenBSD", r"OpenBSD", None),
    rule("NetBSD", r"NetBSD", None),
    rule("Solaris", r"SunOS|Solaris", None),
    rule("AIX", r"\bAIX\b", None),
    rule("OS/2", r"OS/2", None),
    rule("Haiku", r"Haiku", None),
];

/// Device families after the bot check. Tablets come before mobile so that
/// tablet tokens win over the generic `android` mobile token.
pub const DEVICE_RULES: &[DeviceRuleSpec] = &[
    DeviceRuleSpec { device: DeviceType::IPad, pattern: r"iPad" },
    DeviceRuleSpec { device: DeviceType::IPod, pattern: r"iPod" },
    DeviceRuleSpec { device: DeviceType::IPhone, pattern: r"iPhone" },
    DeviceRuleSpec {
        device: DeviceType::GameConsole,
        pattern: r"(?i)playstation|xbox|nintendo|\bwii\b",
    },
    DeviceRuleSpec {
        device: DeviceType::SmartTv,
        pattern: r"(?i)smart-?tv|hbbtv|apple ?tv|google ?tv|android tv|\bcrkey\b|roku|netcast|bravia",
    },
    DeviceRuleSpec {
        device: DeviceType::Tablet,
        pattern: r"(?i)tablet|kindle fire|silk/|playbook|xoom|mediapad|matepad|\bsm-t\d|\bgt-p\d",
    },
    DeviceRuleSpec {
        device: DeviceType::Mobile,
        pattern: r"(?i)mobile|android|iemobile|opera mini|blackberry|windows phone|symbian|kaios|\bmobi\b|phone",
    },
    DeviceRuleSpec {
        device: DeviceType::Wearable,
        pattern: r"(?i)watch|wear os|wearable",
    },
    DeviceRuleSpec {
        device: DeviceType::IoT,
        pattern: r"(?i)\biot\b|raspberry|arduino|esp8266|esp32|smart.?home|alexa|echo dot",
    },
    DeviceRuleSpec {
        device: DeviceType::EReader,
        pattern: r"(?i)kindle|\bnook\b|kobo|pocketbook|tolino",
    },
];
