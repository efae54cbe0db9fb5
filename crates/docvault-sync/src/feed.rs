//! Authoritative list sources backed by the document controller

use async_trait::async_trait;
use docvault_core::{CallerContext, CollectionView, FileFilters, FileRecord};
use docvault_lifecycle::DocumentController;

/// Produces the current authoritative list for a surface
#[async_trait]
pub trait ListSource<T>: Send + Sync {
    async fn fetch(&self) -> Vec<T>;
}

/// Active files visible to one caller
pub struct ActiveFiles {
    controller: DocumentController,
    caller: CallerContext,
    filters: FileFilters,
}

impl ActiveFiles {
    pub fn new(controller: DocumentController, caller: CallerContext, filters: FileFilters) -> Self {
        Self {
            controller,
            caller,
            filters,
        }
    }
}

#[async_trait]
impl ListSource<FileRecord> for ActiveFiles {
    async fn fetch(&self) -> Vec<FileRecord> {
        self.controller.list_files(&self.caller, &self.filters).await
    }
}

/// Recycle bin contents visible to one caller
pub struct DeletedFiles {
    controller: DocumentController,
    caller: CallerContext,
}

impl DeletedFiles {
    pub fn new(controller: DocumentController, caller: CallerContext) -> Self {
        Self { controller, caller }
    }
}

#[async_trait]
impl ListSource<FileRecord> for DeletedFiles {
    async fn fetch(&self) -> Vec<FileRecord> {
        self.controller.list_deleted_files(&self.caller).await
    }
}

pub struct Collections {
    controller: DocumentController,
}

impl Collections {
    pub fn new(controller: DocumentController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl ListSource<CollectionView> for Collections {
    async fn fetch(&self) -> Vec<CollectionView> {
        self.controller.list_collections().await
    }
}
