// Steps are pre-joined command strings; the file has no trailing newline.
pub static TEMPLATE_CONTAINERFILE: &str =
    "FROM {{base_image}}{{#each steps}}\nRUN {{this}}{{/each}}";

pub const CONTAINERFILE_NAME: &str = "Dockerfile";

// Joins commands that share one RUN step.
pub const STEP_SEPARATOR: &str = " \\\n\t&& ";
