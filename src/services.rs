//! Shared, process-wide lint services.
//!
//! [`LintServices`] bundles the UCD and unit classifiers with their status
//! caches, the vocabulary checkers, and the resolver used to open STREAM
//! `href`s. One instance is built per process and shared between parses
//! through an `Arc`; everything in it is safe for concurrent use.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::attribute::ucd::{BuiltinUcdClassifier, UcdClassifier, UcdStatus};
use crate::attribute::units::{UnitClassifier, UnitStatus, VoUnitsClassifier};
use crate::attribute::vocab::{
    DesiseFileSource, OfflineSource, Vocabulary, VocabularyChecker, VocabularySource,
};
use crate::cache::{StatusCache, DEFAULT_CAPACITY};
use crate::config::ServiceConfig;
use crate::error::LintError;

/// Opens resources named by STREAM `href` attributes.
pub trait ResourceResolver: Send + Sync {
    /// Opens `href`, resolving relative references against `base`.
    fn open(&self, href: &str, base: Option<&Path>) -> io::Result<Box<dyn Read + Send>>;
}

/// Resolver for local files and `file:` URLs. Remote URLs are refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResolver;

impl FileResolver {
    fn local_path(href: &str, base: Option<&Path>) -> io::Result<PathBuf> {
        let path = if let Some(rest) = href.strip_prefix("file://") {
            PathBuf::from(rest)
        } else if let Some(rest) = href.strip_prefix("file:") {
            PathBuf::from(rest)
        } else if href.contains("://") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("remote resource {} not fetched", href),
            ));
        } else {
            PathBuf::from(href)
        };
        Ok(match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }
}

impl ResourceResolver for FileResolver {
    fn open(&self, href: &str, base: Option<&Path>) -> io::Result<Box<dyn Read + Send>> {
        let path = Self::local_path(href, base)?;
        log::debug!("Opening STREAM href {}", path.display());
        Ok(Box::new(File::open(path)?))
    }
}

/// Classifiers, caches and resolvers shared by all parses.
pub struct LintServices {
    ucd: Box<dyn UcdClassifier>,
    ucd_cache: StatusCache<UcdStatus>,
    units: Box<dyn UnitClassifier>,
    unit_cache: StatusCache<UnitStatus>,
    ref_frame: VocabularyChecker,
    ref_position: VocabularyChecker,
    time_scale: VocabularyChecker,
    resolver: Box<dyn ResourceResolver>,
}

impl Default for LintServices {
    fn default() -> Self {
        Self::new(
            Box::new(BuiltinUcdClassifier::new()),
            Box::new(VoUnitsClassifier),
            Arc::new(OfflineSource),
            Box::new(FileResolver),
        )
    }
}

impl LintServices {
    /// Assembles services from their parts.
    pub fn new(
        ucd: Box<dyn UcdClassifier>,
        units: Box<dyn UnitClassifier>,
        vocabularies: Arc<dyn VocabularySource>,
        resolver: Box<dyn ResourceResolver>,
    ) -> Self {
        Self {
            ucd,
            ucd_cache: StatusCache::new(DEFAULT_CAPACITY),
            units,
            unit_cache: StatusCache::new(DEFAULT_CAPACITY),
            ref_frame: VocabularyChecker::new(Vocabulary::RefFrame, Arc::clone(&vocabularies)),
            ref_position: VocabularyChecker::new(
                Vocabulary::RefPosition,
                Arc::clone(&vocabularies),
            ),
            time_scale: VocabularyChecker::new(Vocabulary::TimeScale, vocabularies),
            resolver,
        }
    }

    /// Builds services from a configuration, loading any word lists it names.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, LintError> {
        let mut ucd = BuiltinUcdClassifier::new();
        if let Some(path) = &config.ucd_word_list {
            ucd.load_word_list(path)?;
            log::info!("Loaded UCD word list from {}", path.display());
        }
        if let Some(path) = &config.ucd_deprecated_list {
            ucd.load_deprecated_list(path)?;
        }

        let vocabularies: Arc<dyn VocabularySource> = match &config.vocabulary_dir {
            Some(dir) => Arc::new(DesiseFileSource::new(dir)),
            None => Arc::new(OfflineSource),
        };

        Ok(Self::new(
            Box::new(ucd),
            Box::new(VoUnitsClassifier),
            vocabularies,
            Box::new(FileResolver),
        ))
    }

    /// Replaces the `href` resolver.
    pub fn with_resolver(mut self, resolver: Box<dyn ResourceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Cached UCD classification.
    pub fn ucd_status(&self, ucd: &str) -> UcdStatus {
        self.ucd_cache
            .get_or_insert_with(ucd, || self.ucd.classify(ucd))
    }

    /// Cached unit classification.
    pub fn unit_status(&self, unit: &str) -> UnitStatus {
        self.unit_cache
            .get_or_insert_with(unit, || self.units.classify(unit))
    }

    /// Term checker for a vocabulary.
    pub fn vocabulary(&self, vocabulary: Vocabulary) -> &VocabularyChecker {
        match vocabulary {
            Vocabulary::RefFrame => &self.ref_frame,
            Vocabulary::RefPosition => &self.ref_position,
            Vocabulary::TimeScale => &self.time_scale,
        }
    }

    /// Opens a STREAM `href`.
    pub fn open_resource(
        &self,
        href: &str,
        base: Option<&Path>,
    ) -> io::Result<Box<dyn Read + Send>> {
        self.resolver.open(href, base)
    }
}
