//! Session upload areas and asset resolution.
//!
//! The upload side guarantees one subdirectory per asset role inside
//! `<sessions_dir>/<session_id>/`. This module only resolves and validates
//! what is there.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecast_common::config::SessionLayout;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_scene_model::natural::sort_paths_natural;
use slidecast_scene_model::scene::list_images;

/// Kinds of asset a session can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    Narration,
    Subtitles,
    Background,
    Visual,
    Images,
}

impl AssetRole {
    pub fn label(self) -> &'static str {
        match self {
            AssetRole::Narration => "narration audio",
            AssetRole::Subtitles => "subtitles",
            AssetRole::Background => "background audio",
            AssetRole::Visual => "visual",
            AssetRole::Images => "images",
        }
    }
}

/// Resolved view over one session's upload area.
#[derive(Debug, Clone)]
pub struct SessionAssets {
    session_id: String,
    root: PathBuf,
    layout: SessionLayout,
}

impl SessionAssets {
    pub fn open(
        sessions_dir: &Path,
        session_id: &str,
        layout: &SessionLayout,
    ) -> SlidecastResult<Self> {
        validate_session_id(session_id)?;
        let root = sessions_dir.join(session_id);
        if !root.is_dir() {
            return Err(SlidecastError::input_missing(format!(
                "session {session_id} has no upload area at {}",
                root.display()
            )));
        }
        Ok(Self {
            session_id: session_id.to_string(),
            root,
            layout: layout.clone(),
        })
    }

    pub fn role_dir(&self, role: AssetRole) -> PathBuf {
        let name = match role {
            AssetRole::Narration => &self.layout.audio,
            AssetRole::Subtitles => &self.layout.subtitles,
            AssetRole::Background => &self.layout.background,
            AssetRole::Visual => &self.layout.visual,
            AssetRole::Images => &self.layout.images,
        };
        self.root.join(name)
    }

    /// First file (natural order) in the role's directory.
    pub fn first_file(&self, role: AssetRole) -> SlidecastResult<PathBuf> {
        let dir = self.role_dir(role);
        let mut files = visible_files(&dir, role)?;
        sort_paths_natural(&mut files);
        files.into_iter().next().ok_or_else(|| {
            SlidecastError::input_missing(format!(
                "session {} has no {} uploaded in {}",
                self.session_id,
                role.label(),
                dir.display()
            ))
        })
    }

    /// Image set, naturally sorted. Empty sets are an error.
    pub fn images(&self) -> SlidecastResult<Vec<PathBuf>> {
        let dir = self.role_dir(AssetRole::Images);
        if !dir.is_dir() {
            return Err(SlidecastError::input_missing(format!(
                "no image directory at {}",
                dir.display()
            )));
        }
        let images = list_images(&dir)?;
        if images.is_empty() {
            return Err(SlidecastError::input_missing(format!(
                "no images uploaded in {}",
                dir.display()
            )));
        }
        Ok(images)
    }
}

fn visible_files(dir: &Path, role: AssetRole) -> SlidecastResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SlidecastError::input_missing(format!(
            "no {} directory at {}",
            role.label(),
            dir.display()
        )));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    Ok(files)
}

/// Session ids become path components and output filename parts.
pub fn validate_session_id(session_id: &str) -> SlidecastResult<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SlidecastError::input_missing(format!(
            "invalid session id {session_id:?}"
        )))
    }
}
