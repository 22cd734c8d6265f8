// Macros file - tracing macros are referenced by path inside the macro bodies

/// Logging macros shared by the API, service and storage layers.
///
/// Entity ids are always logged with their `Display` form under the field
/// name given at the call site (`card_id`, `attempt_id`, `session_id`, ...).

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, $id_field:ident = $id:expr) => {
        tracing::debug!(
            operation = $operation,
            $id_field = %$id,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $id_field:ident = $id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            $id_field = %$id,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API warnings, typically rejected requests
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, $id_field:ident = $id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            $id_field = %$id,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// Service Layer Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_service_start {
    ($service:expr, $operation:expr, $id_field:ident = $id:expr) => {
        tracing::debug!(
            service = $service,
            operation = $operation,
            $id_field = %$id,
            "Service operation started"
        );
    };
}

#[macro_export]
macro_rules! log_service_success {
    ($service:expr, $operation:expr, $id_field:ident = $id:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            $id_field = %$id,
            duration_ms = $duration,
            "Service operation completed successfully"
        );
    };
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation completed: {}", $msg
        );
    };
}

/// Log service warnings such as retried writes
#[macro_export]
macro_rules! log_service_warn {
    ($service:expr, $operation:expr, attempt = $attempt:expr, $msg:expr) => {
        tracing::warn!(
            service = $service,
            operation = $operation,
            attempt = $attempt,
            "Service warning: {}",
            $msg
        );
    };
}

// ============================================================================
// Database Operation Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, count = $count:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            result_count = $count,
            duration_ms = $duration,
            "Database operation completed"
        );
    };
    (debug, $operation:expr, $id_field:ident = $id:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            $id_field = %$id,
            duration_ms = $duration,
            "Database operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "database",
            operation = $operation,
            "Database operation: {}", $msg
        );
    };
}

// ============================================================================
// Content Service Logging Macros
// ============================================================================

/// Log calls to the external content-generation service
#[macro_export]
macro_rules! log_content_operation {
    (start, $operation:expr, service = $service:expr, text_length = $len:expr) => {
        tracing::info!(
            component = "content_service",
            operation = $operation,
            service = %$service,
            text_length = $len,
            "Content generation started"
        );
    };
    (success, $operation:expr, service = $service:expr, count = $count:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = "content_service",
            operation = $operation,
            service = %$service,
            generated = $count,
            duration_ms = $duration,
            "Content generation completed"
        );
    };
    (error, $operation:expr, service = $service:expr, error = $error:expr) => {
        tracing::error!(
            component = "content_service",
            operation = $operation,
            service = %$service,
            error = %$error,
            "Content generation failed"
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr, throughput = $throughput:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            throughput_ops_per_sec = $throughput,
            "Performance metrics"
        );
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
}
