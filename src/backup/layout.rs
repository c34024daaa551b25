//! On-disk bundle layout
//!
//! ```text
//! <target>/force-app/main/default/flowDefinitions/<Name>.flowDefinition-meta.xml
//! <target>/force-app/main/default/flows/<Name>-<N>.flow.json
//! <target>/force-app/main/default/flows/<Name>-<N>.flow-meta.xml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::record::RecordFormat;

pub const SOURCE_ROOT: &str = "force-app/main/default";
pub const DEFINITIONS_DIR: &str = "flowDefinitions";
pub const VERSIONS_DIR: &str = "flows";

pub const DEFINITION_SUFFIX: &str = ".flowDefinition-meta.xml";
pub const VERSION_JSON_SUFFIX: &str = ".flow.json";
pub const VERSION_MARKUP_SUFFIX: &str = ".flow-meta.xml";

/// What a bundle file holds, parsed from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleFile {
    Definition {
        developer_name: String,
    },
    Version {
        developer_name: String,
        version_number: u32,
        format: RecordFormat,
    },
}

impl BundleFile {
    pub fn developer_name(&self) -> &str {
        match self {
            BundleFile::Definition { developer_name } => developer_name,
            BundleFile::Version { developer_name, .. } => developer_name,
        }
    }

    /// Parse a bundle file name. `None` if the name is not one of ours.
    pub fn parse(file_name: &str) -> Option<Self> {
        if let Some(name) = file_name.strip_suffix(DEFINITION_SUFFIX) {
            return (!name.is_empty()).then(|| BundleFile::Definition {
                developer_name: name.to_string(),
            });
        }

        let (stem, format) = if let Some(stem) = file_name.strip_suffix(VERSION_JSON_SUFFIX) {
            (stem, RecordFormat::Structured)
        } else if let Some(stem) = file_name.strip_suffix(VERSION_MARKUP_SUFFIX) {
            (stem, RecordFormat::Markup)
        } else {
            return None;
        };

        let (name, number) = stem.rsplit_once('-')?;
        let version_number: u32 = number.parse().ok()?;
        if name.is_empty() || version_number == 0 {
            return None;
        }
        Some(BundleFile::Version {
            developer_name: name.to_string(),
            version_number,
            format,
        })
    }
}

/// Version files found for one flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionFiles {
    pub structured: Option<PathBuf>,
    pub markup: Option<PathBuf>,
}

impl VersionFiles {
    /// The file in `preferred` format, else the other one
    pub fn pick(&self, preferred: RecordFormat) -> Option<(&Path, RecordFormat)> {
        let structured = self.structured.as_deref().map(|p| (p, RecordFormat::Structured));
        let markup = self.markup.as_deref().map(|p| (p, RecordFormat::Markup));
        match preferred {
            RecordFormat::Structured => structured.or(markup),
            RecordFormat::Markup => markup.or(structured),
        }
    }
}

/// Paths of a bundle rooted at a target directory
#[derive(Debug, Clone)]
pub struct BundleLayout {
    root: PathBuf,
}

impl BundleLayout {
    /// Layout under `target`
    pub fn new(target: &Path) -> Self {
        Self {
            root: target.join(SOURCE_ROOT),
        }
    }

    /// Layout containing `file`, found from the file's location.
    ///
    /// The file sits in either the definitions or the versions
    /// directory, whose parent is the source root.
    pub fn containing(file: &Path) -> Option<Self> {
        let dir = file.parent()?;
        let dir_name = dir.file_name()?.to_str()?;
        if dir_name != DEFINITIONS_DIR && dir_name != VERSIONS_DIR {
            return None;
        }
        Some(Self {
            root: dir.parent()?.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn definitions_dir(&self) -> PathBuf {
        self.root.join(DEFINITIONS_DIR)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(VERSIONS_DIR)
    }

    pub fn definition_path(&self, developer_name: &str) -> PathBuf {
        self.definitions_dir()
            .join(format!("{}{}", developer_name, DEFINITION_SUFFIX))
    }

    pub fn version_path(&self, developer_name: &str, version_number: u32, format: RecordFormat) -> PathBuf {
        let suffix = match format {
            RecordFormat::Structured => VERSION_JSON_SUFFIX,
            RecordFormat::Markup => VERSION_MARKUP_SUFFIX,
        };
        self.versions_dir()
            .join(format!("{}-{}{}", developer_name, version_number, suffix))
    }

    /// Every version file of `developer_name`, keyed by version number.
    pub fn discover_versions(&self, developer_name: &str) -> BTreeMap<u32, VersionFiles> {
        let mut found: BTreeMap<u32, VersionFiles> = BTreeMap::new();

        let entries = WalkDir::new(self.versions_dir())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file());

        for entry in entries {
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            if let Some(BundleFile::Version {
                developer_name: name,
                version_number,
                format,
            }) = BundleFile::parse(file_name)
            {
                if name != developer_name {
                    continue;
                }
                let slot = found.entry(version_number).or_default();
                match format {
                    RecordFormat::Structured => slot.structured = Some(entry.into_path()),
                    RecordFormat::Markup => slot.markup = Some(entry.into_path()),
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_file_names() {
        assert_eq!(
            BundleFile::parse("Order_Flow.flowDefinition-meta.xml"),
            Some(BundleFile::Definition {
                developer_name: "Order_Flow".into()
            })
        );
        assert_eq!(
            BundleFile::parse("Order_Flow-12.flow.json"),
            Some(BundleFile::Version {
                developer_name: "Order_Flow".into(),
                version_number: 12,
                format: RecordFormat::Structured,
            })
        );
        assert_eq!(
            BundleFile::parse("My-Flow-3.flow-meta.xml"),
            Some(BundleFile::Version {
                developer_name: "My-Flow".into(),
                version_number: 3,
                format: RecordFormat::Markup,
            })
        );
        assert_eq!(BundleFile::parse("Order_Flow.flow.json"), None);
        assert_eq!(BundleFile::parse("Order_Flow-0.flow.json"), None);
        assert_eq!(BundleFile::parse("notes.txt"), None);
    }

    #[test]
    fn test_paths() {
        let layout = BundleLayout::new(Path::new("/tmp/out"));
        assert_eq!(
            layout.definition_path("Order_Flow"),
            PathBuf::from("/tmp/out/force-app/main/default/flowDefinitions/Order_Flow.flowDefinition-meta.xml")
        );
        assert_eq!(
            layout.version_path("Order_Flow", 2, RecordFormat::Markup),
            PathBuf::from("/tmp/out/force-app/main/default/flows/Order_Flow-2.flow-meta.xml")
        );

        let found = BundleLayout::containing(&layout.version_path("Order_Flow", 2, RecordFormat::Structured)).unwrap();
        assert_eq!(found.root(), layout.root());
        assert!(BundleLayout::containing(Path::new("/tmp/elsewhere/x.flow.json")).is_none());
    }

    #[test]
    fn test_discover_versions() {
        let dir = TempDir::new().unwrap();
        let layout = BundleLayout::new(dir.path());
        fs::create_dir_all(layout.versions_dir()).unwrap();
        for file in [
            "Order_Flow-1.flow.json",
            "Order_Flow-1.flow-meta.xml",
            "Order_Flow-2.flow.json",
            "Order_Flow_Two-1.flow.json",
            "README.md",
        ] {
            fs::write(layout.versions_dir().join(file), "{}").unwrap();
        }

        let found = layout.discover_versions("Order_Flow");
        assert_eq!(found.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(found[&1].markup.is_some());
        assert!(found[&2].markup.is_none());

        let (path, format) = found[&2].pick(RecordFormat::Markup).unwrap();
        assert_eq!(format, RecordFormat::Structured);
        assert!(path.ends_with("Order_Flow-2.flow.json"));
    }

    #[test]
    fn test_discover_in_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(BundleLayout::new(dir.path()).discover_versions("X").is_empty());
    }
}
