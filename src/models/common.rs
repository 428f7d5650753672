use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            code: None,
            retryable: false,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            error: None,
            code: None,
            retryable: false,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(code: &'static str, error: String, retryable: bool) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error),
            code: Some(code),
            retryable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationQuery {
    pub const MAX_LIMIT: u32 = 100;

    /// Page (1-based) and limit with defaults applied and bounds clamped.
    pub fn resolve(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, Self::MAX_LIMIT);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Slices an already ordered collection into the requested page.
    pub fn paginate(items: Vec<T>, query: &PaginationQuery) -> Self {
        let (page, limit) = query.resolve();
        let total = items.len() as u32;
        let offset = (page as usize - 1).saturating_mul(limit as usize);

        let data = items
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Self {
            data,
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}
