// Bullet generation: context assembly, prompt construction, bullet parsing and the
// pipeline that ties them together. All backend calls go through llm_client.

pub mod bullets;
pub mod context;
pub mod handlers;
pub mod pipeline;
pub mod prompts;

