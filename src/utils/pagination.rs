pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Normalized (page, per_page, offset).
pub fn window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let offset = (page as u64 - 1) * per_page as u64;
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(window(None, None), (1, 20, 0));
        assert_eq!(window(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(window(Some(3), Some(500)), (3, 100, 200));
    }
}
