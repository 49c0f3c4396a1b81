mod events;
mod helpers;
mod mocks;
mod products;
mod sessions;
