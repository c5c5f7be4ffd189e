//! Catalog queries: products, variants, images and categories.
//!
//! Storefront reads go through the shared cache. Admin writes invalidate the
//! whole catalog cache, which is small enough that targeted invalidation is
//! not worth the bookkeeping.

use oja_core::catalog::{
    Category, NewProduct, NewVariant, NewVariantRow, Page, Product, ProductDetail, ProductFilters,
    ProductImage, ProductUpdate, ProductVariant,
};
use oja_core::{CategoryId, ProductId, ProductStatus};
use tracing::{debug, instrument};

use crate::cache::CacheValue;
use crate::rest::Stamped;
use crate::{Backend, BackendError};

const PRODUCTS: &str = "products";
const VARIANTS: &str = "product_variants";
const IMAGES: &str = "product_images";
const CATEGORIES: &str = "categories";

impl Backend {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Active products matching `filters`, one page at a time.
    ///
    /// Listings without a search term are cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(
        &self,
        page: u32,
        per_page: u32,
        filters: &ProductFilters,
    ) -> Result<Page<Product>, BackendError> {
        let search = filters.search_term();
        let cache_key = format!("products:{page}:{per_page}:{filters:?}");

        if search.is_none()
            && let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let (from, to) = Page::<Product>::bounds(page, per_page);
        let mut query = self
            .from(PRODUCTS)
            .eq("status", ProductStatus::Active);

        if let Some(category) = filters.category {
            query = query.eq("category_id", category);
        }
        if let Some(min) = filters.min_price {
            query = query.gte("price", min);
        }
        if let Some(max) = filters.max_price {
            query = query.lte("price", max);
        }
        if let Some(term) = &search {
            query = query.or(&format!(
                "title.ilike.*{term}*,description.ilike.*{term}*"
            ));
        }
        let (column, ascending) = filters.sort.ordering();
        let (items, total) = query
            .order(column, ascending)
            .range(from, to)
            .fetch_with_count::<Product>()
            .await?;

        let result = Page {
            items,
            total,
            page: page.max(1),
            per_page,
        };

        if search.is_none() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(result.clone()))
                .await;
        }

        Ok(result)
    }

    /// A product with its variants and gallery images.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if there is no such product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductDetail, BackendError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(detail)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*detail);
        }

        let product: Product = self.from(PRODUCTS).eq("id", id).single().await?;
        let (variants, gallery) = tokio::join!(
            self.get_product_variants(id),
            self.get_product_images(id)
        );

        let detail = ProductDetail {
            product,
            variants: variants?,
            gallery: gallery?,
        };

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(detail.clone())))
            .await;

        Ok(detail)
    }

    /// Variants of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_product_variants(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductVariant>, BackendError> {
        self.from(VARIANTS)
            .eq("product_id", product_id)
            .fetch()
            .await
    }

    /// Gallery images of a product, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_product_images(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductImage>, BackendError> {
        self.from(IMAGES)
            .eq("product_id", product_id)
            .order("display_order", true)
            .fetch()
            .await
    }

    /// Newest active products in a category, excluding one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_related_products(
        &self,
        category: CategoryId,
        exclude: ProductId,
        limit: u64,
    ) -> Result<Vec<Product>, BackendError> {
        self.from(PRODUCTS)
            .eq("status", ProductStatus::Active)
            .eq("category_id", category)
            .neq("id", exclude)
            .order("created_at", false)
            .limit(limit)
            .fetch()
            .await
    }

    // =========================================================================
    // Category Methods
    // =========================================================================

    /// Top-level categories by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, BackendError> {
        let cache_key = "categories".to_string();

        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self
            .from(CATEGORIES)
            .is_null("parent_id")
            .order("name", true)
            .fetch()
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Direct children of a category, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_subcategories(
        &self,
        parent: CategoryId,
    ) -> Result<Vec<Category>, BackendError> {
        self.from(CATEGORIES)
            .eq("parent_id", parent)
            .order("name", true)
            .fetch()
            .await
    }

    /// A single category.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if there is no such category.
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, BackendError> {
        self.from(CATEGORIES).eq("id", id).single().await
    }

    // =========================================================================
    // Admin Methods
    // =========================================================================

    /// Every product regardless of status, newest first, optionally
    /// filtered by title.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_all_products(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
    ) -> Result<Page<Product>, BackendError> {
        let (from, to) = Page::<Product>::bounds(page, per_page);
        let filters = ProductFilters {
            search: search.map(str::to_string),
            ..ProductFilters::default()
        };
        let mut query = self.from(PRODUCTS);
        if let Some(term) = filters.search_term() {
            query = query.ilike("title", format!("*{term}*"));
        }
        let (items, total) = query
            .order("created_at", false)
            .range(from, to)
            .fetch_with_count()
            .await?;
        Ok(Page {
            items,
            total,
            page: page.max(1),
            per_page,
        })
    }

    /// Insert a product and its variants.
    ///
    /// # Errors
    ///
    /// Returns an error if either insert is rejected. Variants are inserted
    /// after the product, so a variant failure leaves the product in place.
    #[instrument(skip(self, product, variants), fields(title = %product.title))]
    pub async fn create_product(
        &self,
        product: &NewProduct,
        variants: &[NewVariant],
    ) -> Result<Product, BackendError> {
        let created: Product = self
            .from(PRODUCTS)
            .insert::<_, Product>(product)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("inserted product".to_string()))?;

        if !variants.is_empty() {
            let rows: Vec<NewVariantRow<'_>> = variants
                .iter()
                .map(|variant| NewVariantRow {
                    product_id: created.id,
                    variant,
                })
                .collect();
            self.from(VARIANTS)
                .insert::<_, serde_json::Value>(&rows)
                .await?;
        }

        self.invalidate_catalog();
        Ok(created)
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if there is no such product.
    #[instrument(skip(self, changes), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductUpdate,
    ) -> Result<Product, BackendError> {
        let updated = self
            .from(PRODUCTS)
            .eq("id", id)
            .update::<_, Product>(&Stamped::now(changes))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("product {id}")))?;

        self.invalidate_catalog();
        Ok(updated)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.from(PRODUCTS).eq("id", id).delete().await?;
        self.invalidate_catalog();
        Ok(())
    }
}
