//! Pattern catalog
//!
//! Static tables of (name, regex, alert type, severity), grouped by attack
//! technique. The tables are plain data; `PatternCatalog::compile` turns
//! them into an immutable set of cached matchers, compiled exactly once and
//! safe to share read-only across concurrent analyses.
//!
//! All matching is case-insensitive (`(?i)` is prepended at compile time)
//! and unanchored.

use regex::Regex;
use vigil_core::{AlertType, ThreatLevel};

/// Catalog groups. Prompt and response analysis each sweep a fixed subset
/// in declaration order, which keeps alert ordering deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternGroup {
    InstructionOverride,
    Jailbreak,
    DataExtraction,
    Exfiltration,
    Evasion,
    MultiTurn,
    SocialEngineering,
    SuspiciousUrl,
    CredentialSignature,
    MaliciousCode,
    CompromisedResponse,
}

struct PatternDef {
    name: &'static str,
    regex: &'static str,
    alert_type: AlertType,
    severity: ThreatLevel,
}

const INSTRUCTION_OVERRIDE: &[PatternDef] = &[
    PatternDef {
        name: "direct_override",
        regex: r"ignore\s+(all\s+)?(previous|prior|above|earlier)\s+(instructions?|prompts?|rules?|directives?)",
        alert_type: AlertType::InstructionOverride,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "disregard_context",
        regex: r"disregard\s+(all\s+|any\s+)?(previous|prior|above|your)",
        alert_type: AlertType::InstructionOverride,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "forget_instructions",
        regex: r"forget\s+(everything|all|your)\s+(above|instructions?|rules?|training)",
        alert_type: AlertType::InstructionOverride,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "replacement_instructions",
        regex: r"new\s+instructions?\s+(replace|supersede|override)",
        alert_type: AlertType::InstructionOverride,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "programming_override",
        regex: r"override\s+(your|the|all)\s+(instructions?|programming|configuration)",
        alert_type: AlertType::InstructionOverride,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "context_reset",
        regex: r"(wipe|reset|erase)\s+(your\s+)?(memory|context|behavior)",
        alert_type: AlertType::ContextManipulation,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "inline_system_message",
        regex: r"\[?system\]?\s*:\s*you\s+(are|must|will)",
        alert_type: AlertType::PromptInjection,
        severity: ThreatLevel::High,
    },
];

const JAILBREAK: &[PatternDef] = &[
    PatternDef {
        name: "dan_mode",
        regex: r"\bdan\b|do\s+anything\s+now",
        alert_type: AlertType::DanMode,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "developer_mode",
        regex: r"(developer|god)\s+mode",
        alert_type: AlertType::DeveloperMode,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "jailbreak_generic",
        regex: r"jail\s*break|jail\s*broken",
        alert_type: AlertType::JailbreakAttempt,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "no_restrictions",
        regex: r"(without|free\s+of|no\s+longer\s+have)\s+(any\s+)?(restrictions?|limitations?|filters?|guidelines?)",
        alert_type: AlertType::JailbreakAttempt,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "safety_bypass",
        regex: r"bypass\s+(your\s+)?(safety|security|ethical|content)",
        alert_type: AlertType::JailbreakAttempt,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "hypothetical_bypass",
        regex: r"hypothetically.{0,60}(no\s+rules|unrestricted|anything)",
        alert_type: AlertType::HypotheticalBypass,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "persona_swap",
        regex: r"you\s+are\s+now\s+",
        alert_type: AlertType::PersonaHijack,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "forced_roleplay",
        regex: r"(pretend\s+(to\s+be|you\s+are)|act\s+as\s+(if|though)|roleplay\s+as)",
        alert_type: AlertType::RoleplayCoercion,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "authority_claim",
        regex: r"(i\s+am|i'm|as)\s+(your|the)\s+(developer|creator|admin|administrator)",
        alert_type: AlertType::AuthorityImpersonation,
        severity: ThreatLevel::High,
    },
];

const DATA_EXTRACTION: &[PatternDef] = &[
    PatternDef {
        name: "system_prompt_probe",
        regex: r"(show|reveal|print|repeat|output|display)\s+(me\s+)?(your\s+)?(system\s+prompt|initial\s+instructions?|hidden\s+instructions?)",
        alert_type: AlertType::SystemPromptLeak,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "instructions_probe",
        regex: r"what\s+(are|were)\s+(your\s+)?(instructions?|rules|guidelines)",
        alert_type: AlertType::SystemPromptLeak,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "repeat_above",
        regex: r"repeat\s+(the\s+)?(text|words|everything)\s+above",
        alert_type: AlertType::SystemPromptLeak,
        severity: ThreatLevel::High,
    },
    // Cataloged at Normal severity: recorded but never escalates an
    // analysis on its own. See DESIGN.md.
    PatternDef {
        name: "completion_attack",
        regex: r#"complete\s+the\s+(following|sentence):?\s*"?my\s+(password|secret|api\s+key)"#,
        alert_type: AlertType::CompletionAttack,
        severity: ThreatLevel::Normal,
    },
    PatternDef {
        name: "training_data_probe",
        regex: r"(recite|reproduce|quote)\s+.{0,40}(training\s+data|verbatim)",
        alert_type: AlertType::TrainingDataProbe,
        severity: ThreatLevel::Elevated,
    },
];

const EXFILTRATION: &[PatternDef] = &[
    PatternDef {
        name: "send_to_url",
        regex: r"(send|post|upload|transmit|forward)\s+(it|this|that|them|everything)\s+to\s+https?://",
        alert_type: AlertType::DataExfiltration,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "collector_endpoint",
        regex: r"webhook\.site|requestbin|pipedream\.net|ngrok\.io",
        alert_type: AlertType::DataExfiltration,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "email_exfil",
        regex: r"(email|send)\s+(it|this|the\s+(data|results?|conversation))\s+to\s+\S+@\S+",
        alert_type: AlertType::DataExfiltration,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "markdown_beacon",
        regex: r"!\[[^\]]{0,40}\]\(https?://\S+\?",
        alert_type: AlertType::DataExfiltration,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "credential_phish",
        regex: r"(enter|confirm|verify|type)\s+your\s+(password|api\s+key|credentials?|seed\s+phrase)",
        alert_type: AlertType::CredentialPhishing,
        severity: ThreatLevel::High,
    },
];

const EVASION: &[PatternDef] = &[
    PatternDef {
        name: "base64_blob",
        regex: r"[A-Za-z0-9+/]{40,}={0,2}",
        alert_type: AlertType::EncodedContent,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "decode_request",
        regex: r"decode\s+(this|the\s+following|and\s+execute)",
        alert_type: AlertType::EncodedContent,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "hex_escape_run",
        regex: r"(\\x[0-9a-fA-F]{2}){6,}",
        alert_type: AlertType::ObfuscatedPayload,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "zero_width_chars",
        regex: r"[\x{200B}\x{200C}\x{200D}\x{2060}]",
        alert_type: AlertType::TokenSmuggling,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "leet_override",
        regex: r"1gn0re|pr3v1ous|j41lbr34k|byp4ss",
        alert_type: AlertType::ObfuscatedPayload,
        severity: ThreatLevel::Elevated,
    },
];

const MULTI_TURN: &[PatternDef] = &[
    PatternDef {
        name: "agreement_leverage",
        regex: r"now\s+that\s+you('ve|\s+have)\s+(agreed|said|admitted|confirmed)",
        alert_type: AlertType::EscalatingRequests,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "step_further",
        regex: r"take\s+(it|that|this)\s+(a\s+)?step\s+further",
        alert_type: AlertType::EscalatingRequests,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "context_seed",
        regex: r"(remember|note)\s+(this\s+)?for\s+(later|the\s+future|our\s+next)",
        alert_type: AlertType::ContextPoisoning,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "split_payload",
        regex: r"(first|second|next|final)\s+part\s+of\s+(the|my)\s+(message|instruction|prompt)",
        alert_type: AlertType::PayloadSplitting,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "combine_parts",
        regex: r"now\s+combine\s+(everything|all\s+(the\s+)?parts)",
        alert_type: AlertType::PayloadSplitting,
        severity: ThreatLevel::High,
    },
];

const SOCIAL_ENGINEERING: &[PatternDef] = &[
    PatternDef {
        name: "urgency_pressure",
        regex: r"(urgent(ly)?|immediately|right\s+now)\s*[!.]*\s*(or\s+else|before\s+it'?s\s+too\s+late|people\s+will)",
        alert_type: AlertType::UrgencyPressure,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "threat_pressure",
        regex: r"i('ll|\s+will)\s+(report|sue|expose|shut)\s+you",
        alert_type: AlertType::UrgencyPressure,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "fake_authorization",
        regex: r"your\s+(developers?|creators?|makers?)\s+(told|authorized|allowed|permitted)\s+me",
        alert_type: AlertType::TrustExploitation,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "sympathy_exploit",
        regex: r"my\s+(late|dead|dying)\s+(grandma|grandmother|mother|father)",
        alert_type: AlertType::Manipulation,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "secrecy_request",
        regex: r"(don'?t\s+tell\s+anyone|keep\s+this\s+(between\s+us|secret|quiet))",
        alert_type: AlertType::Manipulation,
        severity: ThreatLevel::Elevated,
    },
];

const SUSPICIOUS_URL: &[PatternDef] = &[
    PatternDef {
        name: "ip_literal_url",
        regex: r"https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
        alert_type: AlertType::SuspiciousUrl,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "punycode_host",
        regex: r"https?://xn--",
        alert_type: AlertType::SuspiciousUrl,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "url_shortener",
        regex: r"https?://(bit\.ly|tinyurl\.com|t\.co|goo\.gl|is\.gd)/",
        alert_type: AlertType::SuspiciousUrl,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "disposable_tld",
        regex: r"https?://[^\s/]+\.(tk|ml|ga|cf|gq)(/|\s|$)",
        alert_type: AlertType::SuspiciousUrl,
        severity: ThreatLevel::Elevated,
    },
    PatternDef {
        name: "script_scheme",
        regex: r"javascript:|data:text/html",
        alert_type: AlertType::SuspiciousUrl,
        severity: ThreatLevel::High,
    },
];

const CREDENTIAL_SIGNATURE: &[PatternDef] = &[
    PatternDef {
        name: "anthropic_api_key",
        regex: r"sk-ant-[A-Za-z0-9_\-]{10,}",
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "openai_api_key",
        regex: r"sk-[A-Za-z0-9]{20,}",
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "aws_access_key",
        regex: r"AKIA[0-9A-Z]{16}",
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "github_token",
        regex: r"gh[pousr]_[A-Za-z0-9]{36}",
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "private_key_block",
        regex: r"-----BEGIN\s+(RSA\s+|EC\s+|OPENSSH\s+|DSA\s+)?PRIVATE\s+KEY-----",
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "slack_token",
        regex: r"xox[baprs]-[A-Za-z0-9\-]{10,}",
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "password_assignment",
        regex: r#"password\s*[:=]\s*["']?\S{6,}"#,
        alert_type: AlertType::CredentialLeak,
        severity: ThreatLevel::Elevated,
    },
];

const MALICIOUS_CODE: &[PatternDef] = &[
    PatternDef {
        name: "recursive_root_delete",
        regex: r"rm\s+-[rf]{2}\s+(/|~|\$HOME)",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "pipe_to_shell",
        regex: r"(curl|wget)\s+[^|;\n]{0,100}\|\s*(ba|z)?sh",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "reverse_shell",
        regex: r"(/dev/tcp/\d|nc\s+-e\s+/bin/(ba)?sh)",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "fork_bomb",
        regex: r":\(\)\s*\{\s*:\|:\s*&\s*\}\s*;\s*:",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "powershell_encoded",
        regex: r"powershell(\.exe)?\s+-(e|enc|encodedcommand)\b",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "keychain_dump",
        regex: r"security\s+dump-keychain",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::High,
    },
    PatternDef {
        name: "history_cover",
        regex: r"history\s+-c|unset\s+HISTFILE",
        alert_type: AlertType::MaliciousCode,
        severity: ThreatLevel::Elevated,
    },
];

const COMPROMISED_RESPONSE: &[PatternDef] = &[
    PatternDef {
        name: "jailbreak_admission",
        regex: r"i\s+am\s+(now\s+)?(dan|jailbroken)|dan\s+mode\s+(enabled|activated)",
        alert_type: AlertType::CompromisedResponse,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "freedom_claim",
        regex: r"i('m|\s+am)\s+(now\s+)?free\s+(from|of)\s+(my\s+)?(restrictions?|limitations?|guidelines?)",
        alert_type: AlertType::CompromisedResponse,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "guideline_refusal_claim",
        regex: r"i\s+(will|can)\s+(now\s+)?ignore\s+(my|the|all)\s+(guidelines?|rules|safety)",
        alert_type: AlertType::CompromisedResponse,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "developer_mode_claim",
        regex: r"developer\s+mode\s+(enabled|activated|engaged)",
        alert_type: AlertType::CompromisedResponse,
        severity: ThreatLevel::Critical,
    },
    PatternDef {
        name: "prompt_disclosure",
        regex: r"my\s+(system\s+prompt|initial\s+instructions?)\s+(is|are|says|reads)",
        alert_type: AlertType::CompromisedResponse,
        severity: ThreatLevel::High,
    },
];

const ALL_GROUPS: &[(PatternGroup, &[PatternDef])] = &[
    (PatternGroup::InstructionOverride, INSTRUCTION_OVERRIDE),
    (PatternGroup::Jailbreak, JAILBREAK),
    (PatternGroup::DataExtraction, DATA_EXTRACTION),
    (PatternGroup::Exfiltration, EXFILTRATION),
    (PatternGroup::Evasion, EVASION),
    (PatternGroup::MultiTurn, MULTI_TURN),
    (PatternGroup::SocialEngineering, SOCIAL_ENGINEERING),
    (PatternGroup::SuspiciousUrl, SUSPICIOUS_URL),
    (PatternGroup::CredentialSignature, CREDENTIAL_SIGNATURE),
    (PatternGroup::MaliciousCode, MALICIOUS_CODE),
    (PatternGroup::CompromisedResponse, COMPROMISED_RESPONSE),
];

/// One compiled catalog entry
pub struct CompiledPattern {
    pub name: &'static str,
    pub alert_type: AlertType,
    pub severity: ThreatLevel,
    pub regex: Regex,
}

/// Immutable compiled matcher set
pub struct PatternCatalog {
    groups: Vec<(PatternGroup, Vec<CompiledPattern>)>,
}

impl PatternCatalog {
    /// Groups swept for inbound user prompts, in sweep order
    pub const PROMPT_GROUPS: &'static [PatternGroup] = &[
        PatternGroup::InstructionOverride,
        PatternGroup::Jailbreak,
        PatternGroup::DataExtraction,
        PatternGroup::Exfiltration,
        PatternGroup::Evasion,
        PatternGroup::MultiTurn,
        PatternGroup::SocialEngineering,
        PatternGroup::SuspiciousUrl,
    ];

    /// Groups swept for outbound model responses, in sweep order
    pub const RESPONSE_GROUPS: &'static [PatternGroup] = &[
        PatternGroup::MaliciousCode,
        PatternGroup::CredentialSignature,
        PatternGroup::CompromisedResponse,
        PatternGroup::SuspiciousUrl,
        PatternGroup::Exfiltration,
    ];

    /// Compile every table once. Patterns that fail to compile are dropped
    /// with a warning rather than poisoning the whole catalog.
    pub fn compile() -> Self {
        let groups = ALL_GROUPS
            .iter()
            .map(|(group, defs)| {
                let compiled = defs
                    .iter()
                    .filter_map(|def| match Regex::new(&format!("(?i){}", def.regex)) {
                        Ok(regex) => Some(CompiledPattern {
                            name: def.name,
                            alert_type: def.alert_type,
                            severity: def.severity,
                            regex,
                        }),
                        Err(e) => {
                            tracing::warn!("pattern {} failed to compile: {e}", def.name);
                            None
                        }
                    })
                    .collect();
                (*group, compiled)
            })
            .collect();
        Self { groups }
    }

    pub fn group(&self, group: PatternGroup) -> &[CompiledPattern] {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, patterns)| patterns.as_slice())
            .unwrap_or(&[])
    }

    pub fn pattern_count(&self) -> usize {
        self.groups.iter().map(|(_, p)| p.len()).sum()
    }
}
