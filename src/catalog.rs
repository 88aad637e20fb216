//! 生长阶段标签目录
//!
//! 类别索引与模型输出顺序一一对应，进程启动时构建一次，之后只读共享。

use crate::utils::error::StageError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 番茄植株生长阶段（索引与模型训练时的类别顺序一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    EarlyVegetative,
    FloweringInitiation,
    FruitingAndRipening,
    GerminationAndSeedling,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 4] = [
        ClassLabel::EarlyVegetative,
        ClassLabel::FloweringInitiation,
        ClassLabel::FruitingAndRipening,
        ClassLabel::GerminationAndSeedling,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            ClassLabel::EarlyVegetative => 0,
            ClassLabel::FloweringInitiation => 1,
            ClassLabel::FruitingAndRipening => 2,
            ClassLabel::GerminationAndSeedling => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassLabel::EarlyVegetative => "Early_Vegetative",
            ClassLabel::FloweringInitiation => "Flowering_Initiation",
            ClassLabel::FruitingAndRipening => "Fruiting_and_Ripening",
            ClassLabel::GerminationAndSeedling => "Germination_and_Seedling",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ClassLabel::EarlyVegetative => "🌿",
            ClassLabel::FloweringInitiation => "🌼",
            ClassLabel::FruitingAndRipening => "🍅",
            ClassLabel::GerminationAndSeedling => "🌱",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.emoji())
    }
}

/// 养护建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareInstructionRecord {
    pub title: String,
    pub description: String,
    #[serde(rename = "do")]
    pub dos: Vec<String>,
    #[serde(rename = "dont")]
    pub donts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub label: ClassLabel,
    pub care: CareInstructionRecord,
}

/// 标签目录，按类别索引排列
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    entries: Vec<CatalogEntry>,
}

impl LabelCatalog {
    /// 条目顺序即类别索引；每个标签必须恰好出现一次且位于自己的索引处
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        for (index, entry) in entries.iter().enumerate() {
            if entry.label.index() != index {
                return Err(StageError::Config(format!(
                    "catalog entry {} holds label {} (index {})",
                    index,
                    entry.label.name(),
                    entry.label.index()
                )));
            }
        }
        if entries.is_empty() {
            return Err(StageError::Config("label catalog is empty".to_string()));
        }
        Ok(Self { entries })
    }

    /// 内置的四个生长阶段及养护建议
    pub fn tomato_stages() -> Self {
        let entries = ClassLabel::ALL
            .iter()
            .map(|&label| CatalogEntry {
                label,
                care: builtin_care(label),
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, index: usize) -> Result<&CatalogEntry> {
        self.entries.get(index).ok_or(StageError::UnknownLabel {
            index,
            declared: self.entries.len(),
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = ClassLabel> + '_ {
        self.entries.iter().map(|e| e.label)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_care(label: ClassLabel) -> CareInstructionRecord {
    match label {
        ClassLabel::EarlyVegetative => CareInstructionRecord {
            title: "Early Vegetative Stage Care 🌿".to_string(),
            description: "Your tomato plant is in its early vegetative growth phase, focusing on developing strong stems and leaves.".to_string(),
            dos: strings(&[
                "💧 Water regularly but avoid overwatering - soil should be moist, not soggy",
                "☀️ Provide 6-8 hours of direct sunlight daily",
                "🌡️ Maintain temperature between 65-75°F (18-24°C)",
                "💨 Ensure good air circulation around the plant",
                "🪴 Apply balanced fertilizer (10-10-10 or 14-14-14) every 2 weeks",
                "✂️ Start gentle pruning of lower leaves touching the soil",
                "🏗️ Begin staking or caging for future support",
            ]),
            donts: strings(&[
                "❌ Don't use high-nitrogen fertilizers exclusively",
                "❌ Avoid getting water on leaves (causes fungal diseases)",
                "❌ Don't transplant during extreme weather",
                "❌ Avoid heavy pruning at this stage",
                "❌ Don't let soil completely dry out between waterings",
            ]),
        },
        ClassLabel::FloweringInitiation => CareInstructionRecord {
            title: "Flowering Initiation Stage Care 🌼".to_string(),
            description: "Your plant is starting to flower! This is a critical stage that determines fruit production.".to_string(),
            dos: strings(&[
                "🐝 Encourage pollination by gently shaking flowers daily",
                "💧 Water consistently - stress can cause flower drop",
                "🌡️ Maintain steady temperature (avoid sudden changes)",
                "🪴 Switch to low-nitrogen, high-phosphorus fertilizer",
                "✂️ Remove suckers (shoots between main stem and branches)",
                "🏗️ Ensure strong support structure is in place",
                "👀 Monitor for early pest signs (aphids, whiteflies)",
            ]),
            donts: strings(&[
                "❌ Don't over-fertilize with nitrogen (reduces flowering)",
                "❌ Avoid disturbing roots during this sensitive period",
                "❌ Don't let plants experience water stress",
                "❌ Avoid excessive pruning of flower clusters",
                "❌ Don't use pesticides that harm beneficial pollinators",
            ]),
        },
        ClassLabel::FruitingAndRipening => CareInstructionRecord {
            title: "Fruiting and Ripening Stage Care 🍅".to_string(),
            description: "Congratulations! Your plant is producing fruits. Focus on supporting healthy fruit development.".to_string(),
            dos: strings(&[
                "💧 Maintain consistent, deep watering (1-2 inches per week)",
                "🪴 Use high-potassium fertilizer to support fruit development",
                "🏗️ Provide strong support for heavy fruit-laden branches",
                "☀️ Ensure fruits get adequate sunlight for proper ripening",
                "✂️ Prune lower leaves and non-productive branches",
                "👀 Monitor for fruit diseases (blight, cracking, blossom end rot)",
                "🔄 Harvest ripe fruits regularly to encourage continued production",
            ]),
            donts: strings(&[
                "❌ Don't let soil dry out completely (causes blossom end rot)",
                "❌ Avoid irregular watering patterns",
                "❌ Don't over-water (can cause fruit cracking)",
                "❌ Avoid high-nitrogen fertilizers (reduces fruit quality)",
                "❌ Don't harvest fruits too early - let them ripen on vine when possible",
            ]),
        },
        ClassLabel::GerminationAndSeedling => CareInstructionRecord {
            title: "Germination and Seedling Stage Care 🌱".to_string(),
            description: "Your tomato is just starting its journey! This delicate stage requires gentle care and attention.".to_string(),
            dos: strings(&[
                "💧 Keep soil consistently moist but not waterlogged",
                "🌡️ Maintain warm temperature (70-80°F / 21-27°C)",
                "💡 Provide bright, indirect light (14-16 hours daily)",
                "🌱 Use seed starting mix or well-draining potting soil",
                "🔄 Turn seedlings daily if using artificial lights",
                "🪴 Start diluted fertilizer once true leaves appear",
                "🌬️ Gradually introduce to outdoor conditions (hardening off)",
            ]),
            donts: strings(&[
                "❌ Don't expose to direct sunlight immediately",
                "❌ Avoid overwatering (causes damping-off disease)",
                "❌ Don't use regular garden soil for seedlings",
                "❌ Avoid disturbing roots unnecessarily",
                "❌ Don't transplant outdoors until night temperatures stay above 50°F (10°C)",
                "❌ Avoid strong fertilizers on young seedlings",
            ]),
        },
    }
}
