use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 能力模块名：启动时固定的集合，不支持运行时动态导入
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
    /// Screen capture + vision model
    Vision,
    /// Real-time search backed answers
    Research,
    /// OS / app automation scripts
    Automation,
    /// Image generation
    Art,
    /// Self-healing code interpreter
    Code,
}

impl CapabilityName {
    pub const ALL: [CapabilityName; 5] = [
        CapabilityName::Vision,
        CapabilityName::Research,
        CapabilityName::Automation,
        CapabilityName::Art,
        CapabilityName::Code,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityName::Vision => "vision",
            CapabilityName::Research => "research",
            CapabilityName::Automation => "automation",
            CapabilityName::Art => "art",
            CapabilityName::Code => "code",
        }
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CapabilityName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vision" => Ok(CapabilityName::Vision),
            "research" => Ok(CapabilityName::Research),
            "automation" => Ok(CapabilityName::Automation),
            "art" => Ok(CapabilityName::Art),
            "code" => Ok(CapabilityName::Code),
            _ => Err(Error::UnknownCapability(s.to_string())),
        }
    }
}

/// 能力状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// 已注册，未激活
    Dormant,
    /// 激活进行中（持有注册表独占区）
    Activating,
    /// 已激活，可直接使用
    Active,
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityStatus::Dormant => f.pad("dormant"),
            CapabilityStatus::Activating => f.pad("activating"),
            CapabilityStatus::Active => f.pad("active"),
        }
    }
}

/// Point-in-time view of one registered module. Snapshots are eventually
/// consistent with the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityModule {
    pub name: CapabilityName,
    pub status: CapabilityStatus,
    /// None until the first activation or use.
    pub last_used: Option<DateTime<Utc>>,
    pub estimated_cost: u32,
}

impl CapabilityModule {
    pub fn is_active(&self) -> bool {
        self.status == CapabilityStatus::Active
    }
}
