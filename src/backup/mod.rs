pub mod format;
pub mod glacier;
pub mod result_error;
pub mod upload_config;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
