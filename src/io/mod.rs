//! Resource access: URI resolution and resource type detection.

mod resolver;
mod resource_types;

pub use resolver::{
    join_uri, unzip_if_gzipped, uri_directory, FileResourceResolver, MemoryResourceResolver,
    ResourceResolver, UnzippingResourceResolver,
};
pub use resource_types::{ContentType, ResourceTypes};
