//! The repository traits the engine consumes.
//!
//! Both traits are implemented by storage backends (e.g. `ssc-store-sqlite`).
//! The tree builder, the lifecycle manager and the API layer depend on these
//! abstractions, not on any concrete backend.
//!
//! Backend errors must convert into [`crate::Error`] so that the engine can
//! tell a missing id from a failed connection.

use std::future::Future;

use uuid::Uuid;

use crate::{
  catalogue::{CatalogueEdit, NewEntry, Pillar, Subtheme, Theme},
  version::{ActiveVersion, FrameworkVersion, FrameworkVersionItem, VersionStatus},
};

// ─── Catalogue ───────────────────────────────────────────────────────────────

/// Access to the master catalogue.
///
/// Listings are returned in catalogue order (the order entries were added).
/// No caching is implied: every call reflects the catalogue at call time.
pub trait CatalogueRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All pillars.
  fn list_pillars(
    &self,
  ) -> impl Future<Output = Result<Vec<Pillar>, Self::Error>> + Send + '_;

  /// Themes of one pillar. Fails with a not-found error if the pillar is
  /// unknown; an empty list means a known pillar without themes.
  fn list_themes(
    &self,
    pillar_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Theme>, Self::Error>> + Send + '_;

  /// Subthemes of one theme. Fails with a not-found error if the theme is
  /// unknown.
  fn list_subthemes(
    &self,
    theme_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Subtheme>, Self::Error>> + Send + '_;

  fn get_pillar(
    &self,
    pillar_id: Uuid,
  ) -> impl Future<Output = Result<Option<Pillar>, Self::Error>> + Send + '_;

  fn get_theme(
    &self,
    theme_id: Uuid,
  ) -> impl Future<Output = Result<Option<Theme>, Self::Error>> + Send + '_;

  fn get_subtheme(
    &self,
    subtheme_id: Uuid,
  ) -> impl Future<Output = Result<Option<Subtheme>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  fn create_pillar(
    &self,
    entry: NewEntry,
  ) -> impl Future<Output = Result<Pillar, Self::Error>> + Send + '_;

  /// Fails with a not-found error if the pillar is unknown.
  fn create_theme(
    &self,
    pillar_id: Uuid,
    entry: NewEntry,
  ) -> impl Future<Output = Result<Theme, Self::Error>> + Send + '_;

  /// Fails with a not-found error if the theme is unknown.
  fn create_subtheme(
    &self,
    theme_id: Uuid,
    entry: NewEntry,
  ) -> impl Future<Output = Result<Subtheme, Self::Error>> + Send + '_;

  fn update_pillar(
    &self,
    pillar_id: Uuid,
    edit: CatalogueEdit,
  ) -> impl Future<Output = Result<Pillar, Self::Error>> + Send + '_;

  fn update_theme(
    &self,
    theme_id: Uuid,
    edit: CatalogueEdit,
  ) -> impl Future<Output = Result<Theme, Self::Error>> + Send + '_;

  fn update_subtheme(
    &self,
    subtheme_id: Uuid,
    edit: CatalogueEdit,
  ) -> impl Future<Output = Result<Subtheme, Self::Error>> + Send + '_;

  /// Remove a pillar. Fails with a constraint error while any theme or
  /// version item still references it.
  fn delete_pillar(
    &self,
    pillar_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_theme(
    &self,
    theme_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_subtheme(
    &self,
    subtheme_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Versions ────────────────────────────────────────────────────────────────

/// CRUD over framework versions and their membership rows.
pub trait VersionRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// All versions, newest first.
  fn list_versions(
    &self,
  ) -> impl Future<Output = Result<Vec<FrameworkVersion>, Self::Error>> + Send + '_;

  /// Retrieve a version by id. Returns `None` if not found.
  fn get_version(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<Option<FrameworkVersion>, Self::Error>> + Send + '_;

  /// Membership rows of a version ordered by `sort_order`. Fails with a
  /// not-found error if the version is unknown.
  fn get_version_items(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FrameworkVersionItem>, Self::Error>> + Send + '_;

  /// Create an empty draft version.
  fn create_version(
    &self,
    name: String,
  ) -> impl Future<Output = Result<FrameworkVersion, Self::Error>> + Send + '_;

  /// Create a draft version with id `version_id` already holding `items`.
  ///
  /// The version and its rows are written in one transaction: if `items`
  /// break the membership invariants or reference unknown catalogue entries,
  /// no version is left behind.
  fn create_version_with_items(
    &self,
    version_id: Uuid,
    name: String,
    items: Vec<FrameworkVersionItem>,
  ) -> impl Future<Output = Result<FrameworkVersion, Self::Error>> + Send + '_;

  /// Atomically replace the whole item set of a draft version.
  ///
  /// Fails with an invalid-state error if the version is published, and with
  /// a validation error if `items` break the membership invariants (see
  /// [`crate::version::validate_items`]). Readers never observe a partially
  /// replaced set.
  fn replace_items(
    &self,
    version_id: Uuid,
    items: Vec<FrameworkVersionItem>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Move a version to `status`. Only `draft → published` is legal; anything
  /// else fails with an invalid-transition error.
  fn set_status(
    &self,
    version_id: Uuid,
    status: VersionStatus,
  ) -> impl Future<Output = Result<FrameworkVersion, Self::Error>> + Send + '_;

  /// Publish a draft whose item set is still exactly `checked`.
  ///
  /// `checked` is the set the caller validated; if the stored rows differ
  /// (in any order) the call fails with a concurrent-edit error and the
  /// version stays a draft. Otherwise behaves like
  /// `set_status(version_id, Published)`.
  fn publish_checked(
    &self,
    version_id: Uuid,
    checked: Vec<FrameworkVersionItem>,
  ) -> impl Future<Output = Result<FrameworkVersion, Self::Error>> + Send + '_;

  /// Delete a draft version and its items. Fails with an invalid-state error
  /// for published versions.
  fn delete_version(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Active pointer ────────────────────────────────────────────────────

  /// The version currently in effect, if one has been activated.
  fn get_active(
    &self,
  ) -> impl Future<Output = Result<Option<ActiveVersion>, Self::Error>> + Send + '_;

  /// Point the active record at `version_id`. Only existence is checked here;
  /// status rules belong to the lifecycle manager.
  fn set_active(
    &self,
    version_id: Uuid,
  ) -> impl Future<Output = Result<ActiveVersion, Self::Error>> + Send + '_;
}
