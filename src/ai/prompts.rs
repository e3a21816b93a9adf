/// Default prompt for image files
pub const IMAGE_PROMPT: &str = "This is an image. Generate a short, descriptive file name for it. Do not include special characters.";

/// Default prompt for text files
pub const TEXT_PROMPT: &str = "This is a text file. Generate a short, descriptive file name based on its content. Do not include special characters.";

/// Trailing request part reiterating the original file name
pub fn build_filename_part(original_name: &str) -> String {
    format!(
        "Original file name: {}\nGenerate a title based on the content. Do not include special characters.",
        original_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_part_mentions_original() {
        let part = build_filename_part("IMG_0001.jpg");
        assert!(part.starts_with("Original file name: IMG_0001.jpg\n"));
    }
}
