/// Pull the script body out of a model reply.
///
/// Prefers a ```python block, then the first fenced block of any language,
/// then the whole reply. An unterminated fence keeps everything after it.
pub fn extract_script(response: &str) -> String {
    let response = response.trim();

    if let Some(start) = response.find("```python") {
        let body = &response[start + "```python".len()..];
        return until_fence(body).trim().to_string();
    }

    if let Some(start) = response.find("```") {
        let after_marker = start + 3;
        // skip the language tag line
        let content_start = response[after_marker..]
            .find('\n')
            .map(|i| after_marker + i + 1)
            .unwrap_or(after_marker);
        return until_fence(&response[content_start..]).trim().to_string();
    }

    response.to_string()
}

fn until_fence(body: &str) -> &str {
    match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_fence() {
        let reply = "Here you go:\n```python\nprint('hi')\n```\nEnjoy.";
        assert_eq!(extract_script(reply), "print('hi')");
    }

    #[test]
    fn test_python_fence_wins_over_earlier_block() {
        let reply = "```text\nnotes\n```\n```python\nimport os\nprint(os.getcwd())\n```";
        assert_eq!(extract_script(reply), "import os\nprint(os.getcwd())");
    }

    #[test]
    fn test_generic_fence_drops_language_tag() {
        let reply = "```sh\necho ok\n```";
        assert_eq!(extract_script(reply), "echo ok");
        assert_eq!(extract_script("```\nx = 1\n```"), "x = 1");
    }

    #[test]
    fn test_plain_reply() {
        assert_eq!(extract_script("  print(1)\n"), "print(1)");
    }

    #[test]
    fn test_unterminated_fence() {
        assert_eq!(extract_script("```python\nprint(2)\n"), "print(2)");
    }
}
