mod files;
mod folders;
mod health;
mod search;
mod share;
mod trash;

pub use files::{
    delete_file, download_file, get_file, list_files, preview_file, rename_file, stream_file,
    upload_file,
};
pub use folders::{create_folder, delete_folder, folder_children, list_folders, rename_folder};
pub use health::health;
pub use search::search;
pub use share::{create_share, resolve_share};
pub use trash::{list_trash, purge, restore};
