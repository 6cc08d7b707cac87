mod resource;
pub use resource::ResourceType;
